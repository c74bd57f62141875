//! 통합 테스트 -- export부터 로테이션까지 전체 흐름 검증

use std::path::Path;

use gvmship_report::{
    ArchiveRotator, FileExporter, LogFile, RotationOutcome, ShipConfigBuilder, ShipError,
    ShipOrchestrator,
};

const REPORT: &str = "\
IP,Hostname,Port,Port Protocol,CVSS,Severity,CVEs,BIDs,CERTs,Other References
10.0.0.5,10.0.0.5,443,tcp,5.0,Medium,\"CVE-1,CVE-2\",,,
";

fn parse_json(line: &str) -> serde_json::Value {
    let start = line.find('{').expect("line has json payload");
    serde_json::from_str(&line[start..]).expect("valid json")
}

fn build(dir: &Path, source: &Path, log: LogFile) -> ShipOrchestrator<FileExporter> {
    let config = ShipConfigBuilder::new()
        .staging_path(dir.join("temp"))
        .cumulative_log_path(log.path())
        .export_dir(dir)
        .build()
        .expect("valid config");
    ShipOrchestrator::builder()
        .config(config)
        .exporter(FileExporter::new(source))
        .cumulative_log(log)
        .build()
        .expect("orchestrator builds")
}

/// 문서화된 예시: CVE 2개, CERT/BID 결측 → 4줄, CERT → CVE → CVE → BID 순서
#[tokio::test]
async fn example_report_yields_four_lines_in_block_order() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.csv");
    std::fs::write(&source, REPORT).unwrap();
    let log = LogFile::new(dir.path().join("scans"));

    let ship = build(dir.path(), &source, log.clone());
    let report = ship.run_default().await.unwrap();
    assert_eq!(report.records, 4);

    let content = std::fs::read_to_string(log.path()).unwrap();
    let lines: Vec<serde_json::Value> = content.lines().map(parse_json).collect();
    assert_eq!(lines.len(), 4);

    let ids: Vec<(&str, &str, &str)> = lines
        .iter()
        .map(|v| {
            (
                v["CERTs"].as_str().unwrap(),
                v["CVEs"].as_str().unwrap(),
                v["BIDs"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        ids,
        vec![("", "", ""), ("", "CVE-1", ""), ("", "CVE-2", ""), ("", "", "")]
    );

    for v in &lines {
        assert_eq!(v["Hostname"], "10.0.0.5");
        assert_eq!(v["CVSS"], 5);
        assert_eq!(v["Impact"], "");
        assert_eq!(v["Other References"], serde_json::json!([]));
    }

    // 라인 접두사: "<Mon DD HH:MM:SS> root openvas: "
    let first = content.lines().next().unwrap();
    let prefix = &first[..first.find('{').unwrap()];
    assert!(prefix.ends_with(" root openvas: "));
    assert_eq!(prefix.len(), "Mar 07 09:05:02 root openvas: ".len());
}

/// 로테이션 후에도 같은 파일에 이어서 기록됨
#[tokio::test]
async fn ship_rotate_ship_keeps_writing_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.csv");
    std::fs::write(&source, REPORT).unwrap();
    let log = LogFile::new(dir.path().join("scans"));
    let ship = build(dir.path(), &source, log.clone());
    let rotator = ArchiveRotator::new(dir.path().join("archive"));

    ship.run_default().await.unwrap();
    let before = std::fs::read_to_string(log.path()).unwrap();

    let outcome = rotator.rotate(&log).await.unwrap();
    let RotationOutcome::Archived { archive_path, bytes } = outcome else {
        panic!("expected archive");
    };
    assert_eq!(bytes, before.len() as u64);
    assert_eq!(std::fs::read_to_string(&archive_path).unwrap(), before);
    assert_eq!(std::fs::metadata(log.path()).unwrap().len(), 0);

    ship.run_default().await.unwrap();
    let after = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(after.lines().count(), 4);
}

/// 로테이션과 실행이 동시에 일어나도 배치가 쪼개지지 않음
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_never_splits_a_batch() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.csv");
    std::fs::write(&source, REPORT).unwrap();
    let log = LogFile::new(dir.path().join("scans"));
    let ship = std::sync::Arc::new(build(dir.path(), &source, log.clone()));
    let rotator = ArchiveRotator::new(dir.path().join("archive"));

    let runner = {
        let ship = std::sync::Arc::clone(&ship);
        tokio::spawn(async move {
            for _ in 0..5 {
                ship.run_default().await.unwrap();
            }
        })
    };

    let mut archived_lines = 0usize;
    for _ in 0..5 {
        if let RotationOutcome::Archived { archive_path, .. } = rotator.rotate(&log).await.unwrap() {
            let content = std::fs::read_to_string(archive_path).unwrap();
            // 아카이브에는 항상 완전한 배치(4줄 단위)만 존재
            assert_eq!(content.lines().count() % 4, 0);
            archived_lines += content.lines().count();
        }
        tokio::task::yield_now().await;
    }
    runner.await.unwrap();

    let remaining = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(remaining.lines().count() % 4, 0);
    assert!(archived_lines % 4 == 0);
}

/// 읽을 수 없는 export는 export 실패로 보고되고 아무것도 기록하지 않음
#[tokio::test]
async fn unreadable_export_is_export_failure() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.csv");
    // UTF-8이 아닌 셀
    std::fs::write(&source, b"IP,CVEs\n10.0.0.5,CVE-\xff\xfe\n").unwrap();
    let log = LogFile::new(dir.path().join("scans"));
    let ship = build(dir.path(), &source, log.clone());

    let err = ship.run_default().await.unwrap_err();
    assert!(
        matches!(err, ShipError::ExportFailed { .. }),
        "unexpected error: {err}"
    );
    assert!(!log.path().exists());
    assert!(!dir.path().join("temp").exists());
}
