//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `gvmship_`
//! - 모듈명: `ship_`, `trigger_`, `archive_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(gvmship_core::metrics::SHIP_RECORDS_WRITTEN_TOTAL).increment(4);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure / accepted, busy, forbidden / archived, noop)
pub const LABEL_RESULT: &str = "result";

/// 식별자 슬롯 레이블 키 (cert, cve, bid)
pub const LABEL_SLOT: &str = "slot";

// ─── 결과 레이블 값 ────────────────────────────────────────────────

/// 실행 성공
pub const RESULT_SUCCESS: &str = "success";

/// 실행 실패
pub const RESULT_FAILURE: &str = "failure";

/// 트리거 수락
pub const RESULT_ACCEPTED: &str = "accepted";

/// 트리거 거절 (이미 실행 중)
pub const RESULT_BUSY: &str = "busy";

/// 트리거 거절 (허용 목록 외 호출자)
pub const RESULT_FORBIDDEN: &str = "forbidden";

/// 로테이션 수행
pub const RESULT_ARCHIVED: &str = "archived";

/// 로테이션 생략 (로그 파일 없음)
pub const RESULT_NOOP: &str = "noop";

// ─── Ship 메트릭 ────────────────────────────────────────────────────

/// Ship: 실행 횟수 (counter, label: result)
pub const SHIP_RUNS_TOTAL: &str = "gvmship_ship_runs_total";

/// Ship: 정규화된 리포트 행 수 (counter)
pub const SHIP_ROWS_PROCESSED_TOTAL: &str = "gvmship_ship_rows_processed_total";

/// Ship: 누적 로그에 기록된 레코드 수 (counter, label: slot)
pub const SHIP_RECORDS_WRITTEN_TOTAL: &str = "gvmship_ship_records_written_total";

/// Ship: 실행 소요 시간 (histogram, 초)
pub const SHIP_RUN_DURATION_SECONDS: &str = "gvmship_ship_run_duration_seconds";

// ─── Trigger 메트릭 ─────────────────────────────────────────────────

/// Trigger: 트리거 요청 수 (counter, label: result)
pub const TRIGGER_REQUESTS_TOTAL: &str = "gvmship_trigger_requests_total";

// ─── Archive 메트릭 ─────────────────────────────────────────────────

/// Archive: 로테이션 횟수 (counter, label: result)
pub const ARCHIVE_ROTATIONS_TOTAL: &str = "gvmship_archive_rotations_total";

/// Archive: 마지막 로테이션에서 보관된 바이트 수 (gauge)
pub const ARCHIVE_LAST_ROTATED_BYTES: &str = "gvmship_archive_last_rotated_bytes";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "gvmship_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "gvmship_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 실행 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 600s 범위 (export 스크립트 실행 포함)
pub const RUN_DURATION_BUCKETS: [f64; 11] = [
    0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `gvmship-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Ship
    describe_counter!(
        SHIP_RUNS_TOTAL,
        "Total number of export-and-ship runs by outcome"
    );
    describe_counter!(
        SHIP_ROWS_PROCESSED_TOTAL,
        "Total number of report rows normalized"
    );
    describe_counter!(
        SHIP_RECORDS_WRITTEN_TOTAL,
        "Total number of fan-out records appended to the cumulative log"
    );
    describe_histogram!(
        SHIP_RUN_DURATION_SECONDS,
        "Time to complete a single ship run in seconds"
    );

    // Trigger
    describe_counter!(
        TRIGGER_REQUESTS_TOTAL,
        "Trigger requests by outcome (accepted, busy, forbidden)"
    );

    // Archive
    describe_counter!(
        ARCHIVE_ROTATIONS_TOTAL,
        "Total number of cumulative log rotations by outcome"
    );
    describe_gauge!(
        ARCHIVE_LAST_ROTATED_BYTES,
        "Bytes copied to the archive by the last rotation"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "gvmship daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
