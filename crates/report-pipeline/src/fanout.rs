//! 식별자 fan-out
//!
//! 정규화 레코드 하나를 식별자마다 레코드 하나로 펼칩니다.
//! `CERTs`에 m개, `CVEs`에 n개, `BIDs`에 p개가 있으면 정확히 m + n + p개를
//! CERT → CVE → BID 블록 순서로 만듭니다.
//!
//! 결측 식별자 목록은 정규화 단계에서 `[""]`가 되므로, 실제 식별자가 없는 슬롯도
//! [`Identifier::Absent`]를 담은 레코드 하나를 만듭니다.

use crate::record::{CanonicalRecord, DerivedRecord, Identifier, IdentifierSlot};

/// 레코드 하나를 펼칩니다.
pub fn fan_out(record: &CanonicalRecord) -> Vec<DerivedRecord> {
    let mut derived = Vec::new();
    for slot in IdentifierSlot::ALL {
        for value in record.identifiers(slot) {
            derived.push(DerivedRecord::new(
                record,
                slot,
                Identifier::from_element(value),
            ));
        }
    }
    derived
}

/// 여러 레코드를 행 순서대로 펼쳐 이어 붙입니다.
pub fn fan_out_all<'a>(records: impl IntoIterator<Item = &'a CanonicalRecord>) -> Vec<DerivedRecord> {
    records.into_iter().flat_map(fan_out).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::record::{BIDS, CERTS, CVES, HOSTNAME, RawRow, RawValue};
    use serde_json::json;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_owned())
    }

    #[test]
    fn example_row_yields_four_records_in_block_order() {
        let rec = normalize(
            RawRow::new()
                .with(CVES, text("CVE-1,CVE-2"))
                .with(CERTS, RawValue::Missing)
                .with(BIDS, RawValue::Missing)
                .with(HOSTNAME, text("10.0.0.5")),
        );

        let out = fan_out(&rec);
        assert_eq!(out.len(), 4);

        let slots: Vec<IdentifierSlot> = out.iter().map(|d| d.slot()).collect();
        assert_eq!(
            slots,
            vec![
                IdentifierSlot::Cert,
                IdentifierSlot::Cve,
                IdentifierSlot::Cve,
                IdentifierSlot::Bid
            ]
        );

        assert!(out[0].identifier().is_absent());
        assert_eq!(out[1].identifier(), &Identifier::Present("CVE-1".into()));
        assert_eq!(out[2].identifier(), &Identifier::Present("CVE-2".into()));
        assert!(out[3].identifier().is_absent());

        for d in &out {
            assert_eq!(d.get(HOSTNAME), Some(&json!("10.0.0.5")));
        }
    }

    #[test]
    fn absent_slots_still_yield_one_record_each() {
        let rec = normalize(RawRow::new().with(HOSTNAME, text("web01")));
        let out = fan_out(&rec);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|d| d.identifier().is_absent()));
        for d in &out {
            assert_eq!(d.get(CERTS), Some(&json!("")));
            assert_eq!(d.get(CVES), Some(&json!("")));
            assert_eq!(d.get(BIDS), Some(&json!("")));
        }
    }

    #[test]
    fn each_record_sets_only_its_own_slot() {
        let rec = normalize(
            RawRow::new()
                .with(CERTS, text("CB-1"))
                .with(CVES, text("CVE-9"))
                .with(BIDS, text("BID-3,BID-4")),
        );
        let out = fan_out(&rec);
        // CERT 1 + CVE 1 + BID 2
        assert_eq!(out.len(), 4);
        for d in &out {
            for slot in IdentifierSlot::ALL {
                let value = d.get(slot.field_name()).and_then(|v| v.as_str());
                if slot == d.slot() {
                    assert_eq!(value, Some(d.identifier().as_str()));
                } else {
                    assert_eq!(value, Some(""));
                }
            }
        }
    }

    #[test]
    fn fan_out_all_keeps_row_order() {
        let a = normalize(RawRow::new().with(HOSTNAME, text("a")));
        let b = normalize(RawRow::new().with(HOSTNAME, text("b")));
        let out = fan_out_all([&a, &b]);
        assert_eq!(out.len(), 6);
        assert!(out[..3].iter().all(|d| d.get(HOSTNAME) == Some(&json!("a"))));
        assert!(out[3..].iter().all(|d| d.get(HOSTNAME) == Some(&json!("b"))));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn id_list() -> impl Strategy<Value = Vec<String>> {
            proptest::collection::vec("[A-Z]{2,4}-[0-9]{1,5}", 0..6)
        }

        fn cell(ids: &[String]) -> RawValue {
            if ids.is_empty() {
                RawValue::Missing
            } else {
                RawValue::Text(ids.join(","))
            }
        }

        proptest! {
            #[test]
            fn count_and_order_match_identifier_lists(
                certs in id_list(),
                cves in id_list(),
                bids in id_list(),
            ) {
                let rec = normalize(
                    RawRow::new()
                        .with(CERTS, cell(&certs))
                        .with(CVES, cell(&cves))
                        .with(BIDS, cell(&bids)),
                );
                let out = fan_out(&rec);

                let m = certs.len().max(1);
                let n = cves.len().max(1);
                let p = bids.len().max(1);
                prop_assert_eq!(out.len(), m + n + p);

                // 블록 순서
                prop_assert!(out[..m].iter().all(|d| d.slot() == IdentifierSlot::Cert));
                prop_assert!(out[m..m + n].iter().all(|d| d.slot() == IdentifierSlot::Cve));
                prop_assert!(out[m + n..].iter().all(|d| d.slot() == IdentifierSlot::Bid));

                // 원래 목록 순서
                let got: Vec<&str> = out[m..m + n].iter().map(|d| d.identifier().as_str()).collect();
                if cves.is_empty() {
                    prop_assert_eq!(got, vec![""]);
                } else {
                    let expected: Vec<&str> = cves.iter().map(String::as_str).collect();
                    prop_assert_eq!(got, expected);
                }
            }
        }
    }
}
