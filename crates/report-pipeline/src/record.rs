//! 레코드 타입 -- 원본 행, 정규화된 레코드, fan-out 결과
//!
//! ```text
//! RawRow --normalize--> CanonicalRecord --fan_out--> Vec<DerivedRecord>
//! ```

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// ─── 알려진 필드명 (GVM CSV 리포트 헤더) ────────────────────────────

/// 호스트명
pub const HOSTNAME: &str = "Hostname";
/// 영향
pub const IMPACT: &str = "Impact";
/// 영향받는 소프트웨어/OS
pub const AFFECTED_SOFTWARE: &str = "Affected Software/OS";
/// 제품 탐지 결과
pub const PRODUCT_DETECTION_RESULT: &str = "Product Detection Result";
/// 취약점 상세
pub const VULNERABILITY_INSIGHT: &str = "Vulnerability Insight";
/// 포트/프로토콜
pub const PORT_PROTOCOL: &str = "Port Protocol";
/// 인증 기관 권고 목록
pub const CERTS: &str = "CERTs";
/// 공개 취약점 ID 목록
pub const CVES: &str = "CVEs";
/// 보안 게시판 ID 목록
pub const BIDS: &str = "BIDs";
/// 기타 참고 자료 목록
pub const OTHER_REFERENCES: &str = "Other References";

/// 결측 시 빈 문자열이 되는 문자열 필드
pub const STRING_FIELDS: [&str; 6] = [
    HOSTNAME,
    IMPACT,
    AFFECTED_SOFTWARE,
    PRODUCT_DETECTION_RESULT,
    VULNERABILITY_INSIGHT,
    PORT_PROTOCOL,
];

/// 정규화 결과에 항상 존재하는 필드 전체
pub const KNOWN_FIELDS: [&str; 10] = [
    HOSTNAME,
    IMPACT,
    AFFECTED_SOFTWARE,
    PRODUCT_DETECTION_RESULT,
    VULNERABILITY_INSIGHT,
    PORT_PROTOCOL,
    CERTS,
    CVES,
    BIDS,
    OTHER_REFERENCES,
];

/// CSV 셀 하나의 원본 값
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// 문자열
    Text(String),
    /// 정수
    Integer(i64),
    /// 유한한 부동소수점
    Float(f64),
    /// 빈 셀 또는 NA 토큰
    Missing,
}

impl RawValue {
    /// 문자열 표현을 반환합니다. 결측이면 `None`.
    ///
    /// 정수로 떨어지는 float는 정수 표기로 변환됩니다 (`5.0` → `"5"`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(match integral_f64(*f) {
                Some(i) => i.to_string(),
                None => f.to_string(),
            }),
            Self::Missing => None,
        }
    }

    /// 결측 여부
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// 소수부가 없고 i64 범위 안의 float를 정수로 변환합니다.
pub(crate) fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 는 2^63 으로 반올림되므로 상한은 미만 비교
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

/// export CSV의 한 행 (컬럼 순서 유지)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    fields: Vec<(String, RawValue)>,
}

impl RawRow {
    /// 빈 행을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드를 추가합니다 (builder 스타일).
    pub fn with(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.push(name, value);
        self
    }

    /// 필드를 추가합니다.
    pub fn push(&mut self, name: impl Into<String>, value: RawValue) {
        self.fields.push((name.into(), value));
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// 필드 수
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 빈 행인지 여부
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 컬럼 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl IntoIterator for RawRow {
    type Item = (String, RawValue);
    type IntoIter = std::vec::IntoIter<(String, RawValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// 정규화된 리포트 레코드
///
/// [`KNOWN_FIELDS`]의 모든 필드가 항상 존재합니다. 필드 순서는 원본 컬럼 순서를 따르며,
/// 원본에 없던 알려진 필드는 뒤에 추가됩니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: Map<String, Value>,
}

impl CanonicalRecord {
    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// 전체 필드 맵
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// 식별자 슬롯의 값 목록을 반환합니다.
    pub fn identifiers(&self, slot: IdentifierSlot) -> Vec<&str> {
        match self.fields.get(slot.field_name()) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// fan-out 대상 식별자 슬롯 (출력 순서대로 정의)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierSlot {
    /// 인증 기관 권고 (`CERTs`)
    Cert,
    /// 공개 취약점 ID (`CVEs`)
    Cve,
    /// 보안 게시판 ID (`BIDs`)
    Bid,
}

impl IdentifierSlot {
    /// fan-out 순서
    pub const ALL: [Self; 3] = [Self::Cert, Self::Cve, Self::Bid];

    /// 레코드상의 필드명
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Cert => CERTS,
            Self::Cve => CVES,
            Self::Bid => BIDS,
        }
    }

    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cert => "cert",
            Self::Cve => "cve",
            Self::Bid => "bid",
        }
    }
}

impl fmt::Display for IdentifierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// fan-out 레코드 하나가 담는 식별자
///
/// `Absent`는 해당 슬롯에 실제 식별자가 없다는 표식이며, 로그에는 빈 문자열로 기록됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// 실제 식별자 값
    Present(String),
    /// 식별자 없음
    Absent,
}

impl Identifier {
    /// 리스트 원소에서 식별자를 만듭니다. 빈 문자열은 `Absent`.
    pub fn from_element(value: &str) -> Self {
        if value.is_empty() {
            Self::Absent
        } else {
            Self::Present(value.to_owned())
        }
    }

    /// 로그에 기록될 문자열
    pub fn as_str(&self) -> &str {
        match self {
            Self::Present(s) => s,
            Self::Absent => "",
        }
    }

    /// 식별자가 없는지 여부
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// fan-out 결과 레코드 (출력 로그 한 줄)
///
/// 모든 필드를 복사하되, `slot`의 필드에는 식별자 하나를, 나머지 두 식별자 필드에는
/// 빈 문자열을 담습니다. 직렬화 시 평탄한 JSON 객체가 됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    slot: IdentifierSlot,
    identifier: Identifier,
    fields: Map<String, Value>,
}

impl DerivedRecord {
    /// 정규화 레코드에서 슬롯 하나를 선택한 레코드를 만듭니다.
    pub fn new(record: &CanonicalRecord, slot: IdentifierSlot, identifier: Identifier) -> Self {
        let mut fields = record.fields.clone();
        for other in IdentifierSlot::ALL {
            let value = if other == slot {
                identifier.as_str().to_owned()
            } else {
                String::new()
            };
            fields.insert(other.field_name().to_owned(), Value::String(value));
        }
        Self {
            slot,
            identifier,
            fields,
        }
    }

    /// 선택된 식별자 슬롯
    pub fn slot(&self) -> IdentifierSlot {
        self.slot
    }

    /// 담긴 식별자
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// 전체 필드 맵
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl Serialize for DerivedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
