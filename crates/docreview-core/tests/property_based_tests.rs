//! Property-based tests for the needs-review rule.
//!
//! The filter expression, the per-record check and the per-field counts are
//! three renditions of one rule. These tests generate field sets, readings and
//! thresholds and check that all three agree with a direct count.

use chrono::NaiveDate;
use docreview_core::{DocumentRecord, FieldDefinition, needs_review_filter, per_field_missing_counts};
use proptest::prelude::*;

const POOL: [&str; 5] = [
    "EFFECTIVE_DATE",
    "NOTICE_PERIOD",
    "PARTY_NAME",
    "GOVERNING_LAW",
    "TERM_MONTHS",
];

/// Value and score of one field; `None` means the record has no reading at all.
type Reading = Option<(Option<String>, Option<f64>)>;

fn fields() -> impl Strategy<Value = Vec<FieldDefinition>> {
    prop::sample::subsequence(POOL.to_vec(), 0..=POOL.len())
        .prop_map(|names| names.into_iter().map(FieldDefinition::new).collect())
}

fn reading() -> impl Strategy<Value = Reading> {
    prop::option::of((
        prop::option::of("[a-z0-9 ]{1,12}"),
        prop::option::of(0.0f64..=1.0),
    ))
}

fn document(index: usize) -> impl Strategy<Value = DocumentRecord> {
    (prop::collection::vec(reading(), POOL.len()), any::<bool>()).prop_map(
        move |(readings, verified)| build(&format!("doc{index}.pdf"), &readings, verified),
    )
}

fn documents() -> impl Strategy<Value = Vec<DocumentRecord>> {
    (0usize..12).prop_flat_map(|n| (0..n).map(document).collect::<Vec<_>>())
}

fn build(file_name: &str, readings: &[Reading], verified: bool) -> DocumentRecord {
    let mut doc = DocumentRecord::new(file_name);
    for (name, reading) in POOL.iter().zip(readings) {
        if let Some((value, score)) = reading {
            doc = doc.with_reading(*name, value.as_deref(), *score);
        }
    }
    if verified {
        let at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();
        doc = doc.with_verification_date(at);
    }
    doc
}

/// The rule written out longhand against the raw readings.
fn field_flagged(doc: &DocumentRecord, field: &str, threshold: f64) -> bool {
    match doc.reading(field) {
        None => true,
        Some(r) => r.value.is_none() || r.score.is_some_and(|s| s <= threshold),
    }
}

#[test]
fn filter_agrees_with_record_check() {
    proptest!(|(fields in fields(), docs in documents(), threshold in 0.0f64..=1.0)| {
        let filter = needs_review_filter(&fields, threshold);
        for doc in &docs {
            let expected = !doc.is_verified()
                && fields.iter().any(|f| field_flagged(doc, &f.name, threshold));
            prop_assert_eq!(filter.evaluate(doc), doc.needs_review(&fields, threshold));
            prop_assert_eq!(filter.evaluate(doc), expected, "{}", doc.file_name);
        }
    });
}

#[test]
fn threshold_is_inclusive() {
    proptest!(|(
        name in prop::sample::select(POOL.to_vec()),
        threshold in 0.0f64..=1.0,
        epsilon in 1e-6f64..0.5
    )| {
        let fields = vec![FieldDefinition::new(name)];
        let filter = needs_review_filter(&fields, threshold);

        let above = DocumentRecord::new("a.pdf")
            .with_reading(name, Some("x"), Some(threshold + epsilon));
        let at = DocumentRecord::new("a.pdf")
            .with_reading(name, Some("x"), Some(threshold));
        prop_assert!(!filter.evaluate(&above));
        prop_assert!(filter.evaluate(&at));

        let verified_at = at.with_verification_date(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
        );
        prop_assert!(!filter.evaluate(&verified_at));
    });
}

#[test]
fn null_score_alone_never_flags() {
    proptest!(|(name in prop::sample::select(POOL.to_vec()), threshold in 0.0f64..=1.0)| {
        let fields = vec![FieldDefinition::new(name)];
        let doc = DocumentRecord::new("a.pdf").with_reading(name, Some("x"), None);
        prop_assert!(!needs_review_filter(&fields, threshold).evaluate(&doc));
        prop_assert!(!doc.needs_review(&fields, threshold));
    });
}

#[test]
fn per_field_counts_match_direct_count() {
    proptest!(|(fields in fields(), docs in documents(), threshold in 0.0f64..=1.0)| {
        let specs = per_field_missing_counts(&fields, threshold);
        prop_assert_eq!(specs.len(), fields.len());
        for (spec, field) in specs.iter().zip(&fields) {
            prop_assert_eq!(&spec.label, &field.name);
            let expected = docs
                .iter()
                .filter(|d| field_flagged(d, &field.name, threshold))
                .count() as u64;
            prop_assert_eq!(spec.tally(&docs), expected, "{}", field.name);
        }
    });
}
