//! Needs-review query building.
//!
//! Filters and aggregations are plain data: a small expression tree that a
//! store translates into whatever query language it speaks, and that can also
//! be evaluated directly against a [`DocumentRecord`]. Nothing here knows any
//! SQL dialect.

use std::fmt;

use crate::document::{DocumentRecord, FieldDefinition};

/// Boolean row predicate over the joined document relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `value_column IS NULL` for the named field.
    ValueMissing { field: String, column: String },
    /// `score_column <= threshold` for the named field. Null scores never match.
    ScoreAtMost {
        field: String,
        column: String,
        threshold: f64,
    },
    /// `verification_date IS NULL`.
    NotVerified,
    /// Disjunction. Empty is false.
    Any(Vec<Expr>),
    /// Conjunction. Empty is true.
    All(Vec<Expr>),
}

impl Expr {
    pub fn value_missing(field: &FieldDefinition) -> Self {
        Expr::ValueMissing {
            field: field.name.clone(),
            column: field.value_column.clone(),
        }
    }

    pub fn score_at_most(field: &FieldDefinition, threshold: f64) -> Self {
        Expr::ScoreAtMost {
            field: field.name.clone(),
            column: field.score_column.clone(),
            threshold,
        }
    }

    /// Evaluate against an in-memory record, with SQL null semantics for
    /// comparisons (a comparison against null is not true).
    pub fn evaluate(&self, doc: &DocumentRecord) -> bool {
        match self {
            Expr::ValueMissing { field, .. } => doc.value(field).is_none(),
            Expr::ScoreAtMost {
                field, threshold, ..
            } => doc.score(field).is_some_and(|s| s <= *threshold),
            Expr::NotVerified => !doc.is_verified(),
            Expr::Any(exprs) => exprs.iter().any(|e| e.evaluate(doc)),
            Expr::All(exprs) => exprs.iter().all(|e| e.evaluate(doc)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::ValueMissing { column, .. } => write!(f, "{column} IS NULL"),
            Expr::ScoreAtMost {
                column, threshold, ..
            } => write!(f, "{column} <= {threshold}"),
            Expr::NotVerified => write!(f, "verification_date IS NULL"),
            Expr::Any(exprs) => write_joined(f, exprs, " OR ", "FALSE"),
            Expr::All(exprs) => write_joined(f, exprs, " AND ", "TRUE"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str, empty: &str) -> fmt::Result {
    if exprs.is_empty() {
        return write!(f, "{empty}");
    }
    write!(f, "(")?;
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{e}")?;
    }
    write!(f, ")")
}

/// A named conditional row count: `count(*) FILTER (WHERE condition) AS label`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountSpec {
    pub label: String,
    pub condition: Expr,
}

impl CountSpec {
    /// Count matching records in memory.
    pub fn tally<'a>(&self, docs: impl IntoIterator<Item = &'a DocumentRecord>) -> u64 {
        docs.into_iter()
            .filter(|d| self.condition.evaluate(d))
            .count() as u64
    }
}

/// Filter selecting documents that still need review.
///
/// Each field contributes `(score <= threshold) OR (value IS NULL)`; the
/// field clauses are OR-ed together and AND-ed with `verification_date IS
/// NULL`. With no fields the disjunction is empty, so nothing matches.
pub fn needs_review_filter(fields: &[FieldDefinition], threshold: f64) -> Expr {
    let per_field = fields
        .iter()
        .map(|f| {
            Expr::Any(vec![
                Expr::score_at_most(f, threshold),
                Expr::value_missing(f),
            ])
        })
        .collect();
    Expr::All(vec![Expr::Any(per_field), Expr::NotVerified])
}

/// One count per field of rows where that field's value is null or its score
/// is at or below `threshold`, labelled by field name, in field order.
pub fn per_field_missing_counts(fields: &[FieldDefinition], threshold: f64) -> Vec<CountSpec> {
    fields
        .iter()
        .map(|f| CountSpec {
            label: f.name.clone(),
            condition: Expr::Any(vec![
                Expr::value_missing(f),
                Expr::score_at_most(f, threshold),
            ]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("EFFECTIVE_DATE"),
            FieldDefinition::new("NOTICE_PERIOD"),
        ]
    }

    fn clean(name: &str) -> DocumentRecord {
        DocumentRecord::new(name)
            .with_reading("EFFECTIVE_DATE", Some("2024-01-01"), Some(0.9))
            .with_reading("NOTICE_PERIOD", Some("30 days"), Some(0.8))
    }

    fn verified_at() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn filter_matches_needs_review_rule() {
        let filter = needs_review_filter(&fields(), 0.5);
        let docs = vec![
            clean("clean.pdf"),
            clean("missing.pdf").with_reading("NOTICE_PERIOD", None, Some(0.9)),
            clean("low.pdf").with_reading("EFFECTIVE_DATE", Some("x"), Some(0.2)),
            clean("done.pdf")
                .with_reading("NOTICE_PERIOD", None, None)
                .with_verification_date(verified_at()),
            DocumentRecord::new("empty.pdf"),
        ];
        for doc in &docs {
            assert_eq!(
                filter.evaluate(doc),
                doc.needs_review(&fields(), 0.5),
                "mismatch for {}",
                doc.file_name
            );
        }
        let matched: Vec<&str> = docs
            .iter()
            .filter(|d| filter.evaluate(d))
            .map(|d| d.file_name.as_str())
            .collect();
        assert_eq!(matched, vec!["missing.pdf", "low.pdf", "empty.pdf"]);
    }

    #[test]
    fn score_crossing_threshold_flips_filter() {
        let filter = needs_review_filter(&fields(), 0.5);
        let above = clean("a.pdf").with_reading("EFFECTIVE_DATE", Some("x"), Some(0.51));
        let at = clean("a.pdf").with_reading("EFFECTIVE_DATE", Some("x"), Some(0.5));
        assert!(!filter.evaluate(&above));
        assert!(filter.evaluate(&at));
    }

    #[test]
    fn empty_field_set_matches_nothing() {
        let filter = needs_review_filter(&[], 0.5);
        assert_eq!(filter, Expr::All(vec![Expr::Any(vec![]), Expr::NotVerified]));
        assert!(!filter.evaluate(&DocumentRecord::new("a.pdf")));
    }

    #[test]
    fn filter_display_reads_like_a_where_clause() {
        let filter = needs_review_filter(&fields()[..1], 0.5);
        assert_eq!(
            filter.to_string(),
            "(((EFFECTIVE_DATE_SCORE <= 0.5 OR EFFECTIVE_DATE_VALUE IS NULL)) AND verification_date IS NULL)"
        );
    }

    #[test]
    fn counts_follow_field_order() {
        let fs = vec![
            FieldDefinition::new("Z_LAST"),
            FieldDefinition::new("A_FIRST"),
            FieldDefinition::new("M_MIDDLE"),
        ];
        let labels: Vec<String> = per_field_missing_counts(&fs, 0.5)
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["Z_LAST", "A_FIRST", "M_MIDDLE"]);
    }

    #[test]
    fn per_field_counts_are_independent() {
        let docs = vec![
            clean("1.pdf").with_reading("EFFECTIVE_DATE", None, None),
            clean("2.pdf")
                .with_reading("EFFECTIVE_DATE", Some("x"), Some(0.1))
                .with_reading("NOTICE_PERIOD", None, None),
            clean("3.pdf").with_reading("NOTICE_PERIOD", Some("x"), Some(0.5)),
            clean("4.pdf"),
        ];
        let counts: Vec<(String, u64)> = per_field_missing_counts(&fields(), 0.5)
            .iter()
            .map(|c| (c.label.clone(), c.tally(&docs)))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("EFFECTIVE_DATE".to_string(), 2),
                ("NOTICE_PERIOD".to_string(), 2),
            ]
        );
    }
}
