//! export CSV 읽기
//!
//! 헤더 행을 필드명으로 사용하여 각 데이터 행을 [`RawRow`]로 변환합니다.
//! 셀 값의 타입은 셀 단위로 추론합니다: NA 토큰 → 결측, 정수, 유한 float, 그 외 문자열.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::ShipError;
use crate::record::{RawRow, RawValue};

/// 결측으로 취급하는 셀 값 (빈 셀 포함)
pub const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// 셀 문자열에서 [`RawValue`]를 추론합니다.
pub fn infer_value(cell: &str) -> RawValue {
    if NA_TOKENS.contains(&cell) {
        return RawValue::Missing;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return RawValue::Integer(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => RawValue::Float(f),
        _ => RawValue::Text(cell.to_owned()),
    }
}

/// 임의의 reader에서 CSV 행을 읽습니다.
///
/// 헤더보다 짧은 행은 남은 필드를 결측으로 채우고, 긴 행의 초과 셀은 버립니다.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > headers.len() {
            debug!(
                row = idx + 1,
                cells = record.len(),
                columns = headers.len(),
                "row has more cells than header, extra cells ignored"
            );
        }

        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let value = record.get(col).map_or(RawValue::Missing, infer_value);
                (name, value)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// export 결과 파일을 읽습니다 (blocking I/O).
///
/// 파일을 열 수 없거나 CSV 형식이 아니면 export 실패로 간주합니다.
pub fn read_report(path: &Path) -> Result<Vec<RawRow>, ShipError> {
    let file = std::fs::File::open(path).map_err(|e| ShipError::ExportFailed {
        reason: format!("cannot open export {}: {e}", path.display()),
    })?;

    read_rows(std::io::BufReader::new(file)).map_err(|e| ShipError::ExportFailed {
        reason: format!("unreadable export {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_na_tokens_as_missing() {
        for token in ["", "NaN", "nan", "NA", "N/A", "null", "None", "<NA>"] {
            assert_eq!(infer_value(token), RawValue::Missing, "token {token:?}");
        }
    }

    #[test]
    fn infer_numbers() {
        assert_eq!(infer_value("443"), RawValue::Integer(443));
        assert_eq!(infer_value("-7"), RawValue::Integer(-7));
        assert_eq!(infer_value("5.0"), RawValue::Float(5.0));
        assert_eq!(infer_value("9.8"), RawValue::Float(9.8));
    }

    #[test]
    fn infer_non_finite_and_text() {
        assert_eq!(infer_value("inf"), RawValue::Text("inf".into()));
        assert_eq!(infer_value("10.0.0.5"), RawValue::Text("10.0.0.5".into()));
        assert_eq!(infer_value(" web01 "), RawValue::Text(" web01 ".into()));
    }

    #[test]
    fn read_rows_uses_header_names() {
        let data = "IP,Hostname,Port,CVEs\n10.0.0.5,web01,443,\"CVE-1,CVE-2\"\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("IP"), Some(&RawValue::Text("10.0.0.5".into())));
        assert_eq!(row.get("Port"), Some(&RawValue::Integer(443)));
        assert_eq!(row.get("CVEs"), Some(&RawValue::Text("CVE-1,CVE-2".into())));
    }

    #[test]
    fn read_rows_pads_short_rows() {
        let data = "IP,Hostname,CVEs\n10.0.0.5\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0].get("CVEs"), Some(&RawValue::Missing));
    }

    #[test]
    fn read_rows_ignores_extra_cells() {
        let data = "IP,Hostname\n10.0.0.5,web01,surplus\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn read_rows_rejects_invalid_utf8() {
        let data: &[u8] = b"IP,CVEs\n10.0.0.5,CVE-\xff\n";
        assert!(read_rows(data).is_err());
    }

    #[test]
    fn read_rows_header_only_is_empty() {
        let rows = read_rows("IP,Hostname\n".as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn read_report_missing_file_is_export_failure() {
        let err = read_report(Path::new("/nonexistent/gvmship/report.csv")).unwrap_err();
        assert!(err.is_export_failure());
    }
}
