//! 행 정규화
//!
//! [`normalize`]는 실패하지 않습니다. 기대한 형태로 해석할 수 없는 값은 결측으로 보고
//! 필드별 기본값을 적용합니다.
//!
//! # 처리 순서
//!
//! 1. 모든 문자열 값 trim (trim 후 빈 값은 결측)
//! 2. 식별자 목록(`CERTs`, `CVEs`, `BIDs`): 쉼표 분리, 결측이면 `[""]`
//! 3. `Other References`: 쉼표 분리, 결측이면 `[]`
//! 4. 문자열 필드: 결측이면 `""`
//! 5. 레코드 전체에 정수형 float → 정수 변환 (재귀)

use serde_json::{Map, Number, Value};

use crate::record::{
    CanonicalRecord, IdentifierSlot, KNOWN_FIELDS, OTHER_REFERENCES, RawRow, RawValue,
    STRING_FIELDS, integral_f64,
};

/// 원본 행 하나를 정규화합니다.
pub fn normalize(raw: RawRow) -> CanonicalRecord {
    let mut fields = Map::new();

    for (name, value) in raw {
        let normalized = normalize_field(&name, value);
        fields.insert(name, normalized);
    }

    // 원본에 없던 알려진 필드도 기본값으로 채움
    for name in KNOWN_FIELDS {
        if !fields.contains_key(name) {
            fields.insert(name.to_owned(), normalize_field(name, RawValue::Missing));
        }
    }

    let mut value = Value::Object(fields);
    coerce_integral_floats(&mut value);
    match value {
        Value::Object(fields) => CanonicalRecord::from_map(fields),
        // coerce_integral_floats는 값의 종류를 바꾸지 않음
        _ => CanonicalRecord::from_map(Map::new()),
    }
}

fn normalize_field(name: &str, value: RawValue) -> Value {
    if is_identifier_field(name) {
        match trimmed_text(&value) {
            Some(text) => split_list(&text),
            None => Value::Array(vec![Value::String(String::new())]),
        }
    } else if name == OTHER_REFERENCES {
        match trimmed_text(&value) {
            Some(text) => split_list(&text),
            None => Value::Array(Vec::new()),
        }
    } else if STRING_FIELDS.contains(&name) {
        Value::String(trimmed_text(&value).unwrap_or_default())
    } else {
        match value {
            RawValue::Text(s) => Value::String(s.trim().to_owned()),
            RawValue::Integer(i) => Value::Number(i.into()),
            RawValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            RawValue::Missing => Value::Null,
        }
    }
}

fn is_identifier_field(name: &str) -> bool {
    IdentifierSlot::ALL.iter().any(|s| s.field_name() == name)
}

/// trim된 문자열 표현. 결측이거나 trim 후 비어 있으면 `None`.
fn trimmed_text(value: &RawValue) -> Option<String> {
    value
        .as_text()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn split_list(text: &str) -> Value {
    Value::Array(
        text.split(',')
            .map(|item| Value::String(item.trim().to_owned()))
            .collect(),
    )
}

/// 소수부 없는 float를 정수로 바꿉니다. 배열/객체 내부까지 재귀 적용됩니다.
///
/// 이미 변환된 값에 다시 적용해도 결과가 같습니다.
pub fn coerce_integral_floats(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if n.is_f64()
                && let Some(i) = n.as_f64().and_then(integral_f64)
            {
                *n = Number::from(i);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_integral_floats),
        Value::Object(map) => map.values_mut().for_each(coerce_integral_floats),
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
}
