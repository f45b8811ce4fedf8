//! Extracted document records and the per-field flagging rule.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

/// One extracted attribute of a document and the columns holding it.
///
/// `value_column` holds the extracted value, `score_column` the extraction
/// confidence (typically in `[0, 1]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub value_column: String,
    pub score_column: String,
}

impl FieldDefinition {
    /// Field using the conventional `<NAME>_VALUE` / `<NAME>_SCORE` columns.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value_column: format!("{name}_VALUE"),
            score_column: format!("{name}_SCORE"),
            name,
        }
    }

    pub fn with_columns(
        name: impl Into<String>,
        value_column: impl Into<String>,
        score_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value_column: value_column.into(),
            score_column: score_column.into(),
        }
    }
}

/// Extracted value and confidence for one field of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldReading {
    pub value: Option<String>,
    pub score: Option<f64>,
}

/// Why a field needs a human to look at it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FlagReason {
    ValueMissing,
    LowScore { score: f64 },
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagReason::ValueMissing => write!(f, "Value missing!"),
            FlagReason::LowScore { score } => {
                write!(f, "The value score, {score}, is below threshold score!")
            }
        }
    }
}

/// One row of the joined source/verification relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub file_name: String,
    /// field name → reading. Fields absent from the map read as all-null.
    pub readings: BTreeMap<String, FieldReading>,
    /// `None` means the document has not been verified yet.
    pub verification_date: Option<NaiveDateTime>,
}

impl DocumentRecord {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            readings: BTreeMap::new(),
            verification_date: None,
        }
    }

    /// Builder used by stores and tests to attach one field reading.
    pub fn with_reading(
        mut self,
        field: impl Into<String>,
        value: Option<&str>,
        score: Option<f64>,
    ) -> Self {
        self.readings.insert(
            field.into(),
            FieldReading {
                value: value.map(str::to_string),
                score,
            },
        );
        self
    }

    pub fn with_verification_date(mut self, at: NaiveDateTime) -> Self {
        self.verification_date = Some(at);
        self
    }

    pub fn reading(&self, field: &str) -> Option<&FieldReading> {
        self.readings.get(field)
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.reading(field).and_then(|r| r.value.as_deref())
    }

    pub fn score(&self, field: &str) -> Option<f64> {
        self.reading(field).and_then(|r| r.score)
    }

    pub fn is_verified(&self) -> bool {
        self.verification_date.is_some()
    }

    /// Flag status of one field. A missing value wins over a low score.
    ///
    /// A null score alone does not flag a field: `NULL <= t` is not true.
    pub fn flag_reason(&self, field: &FieldDefinition, threshold: f64) -> Option<FlagReason> {
        if self.value(&field.name).is_none() {
            return Some(FlagReason::ValueMissing);
        }
        match self.score(&field.name) {
            Some(score) if score <= threshold => Some(FlagReason::LowScore { score }),
            _ => None,
        }
    }

    /// Flagged fields in field-definition order.
    pub fn flagged_fields<'f>(
        &self,
        fields: &'f [FieldDefinition],
        threshold: f64,
    ) -> Vec<(&'f FieldDefinition, FlagReason)> {
        fields
            .iter()
            .filter_map(|f| self.flag_reason(f, threshold).map(|reason| (f, reason)))
            .collect()
    }

    /// Not yet verified and at least one field flagged.
    pub fn needs_review(&self, fields: &[FieldDefinition], threshold: f64) -> bool {
        !self.is_verified()
            && fields
                .iter()
                .any(|f| self.flag_reason(f, threshold).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn effective_date() -> FieldDefinition {
        FieldDefinition::new("EFFECTIVE_DATE")
    }

    #[test]
    fn default_columns_follow_naming_convention() {
        let f = effective_date();
        assert_eq!(f.value_column, "EFFECTIVE_DATE_VALUE");
        assert_eq!(f.score_column, "EFFECTIVE_DATE_SCORE");
    }

    #[test]
    fn missing_value_is_flagged() {
        let doc = DocumentRecord::new("A.pdf").with_reading("EFFECTIVE_DATE", None, Some(0.9));
        assert_eq!(
            doc.flag_reason(&effective_date(), 0.5),
            Some(FlagReason::ValueMissing)
        );
    }

    #[test]
    fn absent_reading_counts_as_missing() {
        let doc = DocumentRecord::new("A.pdf");
        assert_eq!(
            doc.flag_reason(&effective_date(), 0.5),
            Some(FlagReason::ValueMissing)
        );
    }

    #[test]
    fn low_score_is_flagged_despite_value() {
        let doc = DocumentRecord::new("B.pdf").with_reading(
            "EFFECTIVE_DATE",
            Some("2024-01-01"),
            Some(0.3),
        );
        assert_eq!(
            doc.flag_reason(&effective_date(), 0.5),
            Some(FlagReason::LowScore { score: 0.3 })
        );
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let at = DocumentRecord::new("C.pdf").with_reading("EFFECTIVE_DATE", Some("x"), Some(0.5));
        let above =
            DocumentRecord::new("D.pdf").with_reading("EFFECTIVE_DATE", Some("x"), Some(0.500001));
        assert!(at.flag_reason(&effective_date(), 0.5).is_some());
        assert!(above.flag_reason(&effective_date(), 0.5).is_none());
    }

    #[test]
    fn null_score_with_value_is_not_flagged() {
        let doc = DocumentRecord::new("E.pdf").with_reading("EFFECTIVE_DATE", Some("x"), None);
        assert!(doc.flag_reason(&effective_date(), 0.5).is_none());
    }

    #[test]
    fn verified_document_never_needs_review() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let doc = DocumentRecord::new("A.pdf")
            .with_reading("EFFECTIVE_DATE", None, None)
            .with_verification_date(at);
        assert!(!doc.needs_review(&[effective_date()], 0.5));
    }

    #[test]
    fn flagged_fields_keep_definition_order() {
        let fields = vec![
            FieldDefinition::new("B_FIELD"),
            FieldDefinition::new("A_FIELD"),
            FieldDefinition::new("C_FIELD"),
        ];
        let doc = DocumentRecord::new("X.pdf")
            .with_reading("A_FIELD", None, None)
            .with_reading("B_FIELD", Some("v"), Some(0.1))
            .with_reading("C_FIELD", Some("v"), Some(0.99));
        let names: Vec<&str> = doc
            .flagged_fields(&fields, 0.5)
            .iter()
            .map(|(f, _)| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["B_FIELD", "A_FIELD"]);
    }

    #[test]
    fn reason_messages() {
        assert_eq!(FlagReason::ValueMissing.to_string(), "Value missing!");
        assert_eq!(
            FlagReason::LowScore { score: 0.3 }.to_string(),
            "The value score, 0.3, is below threshold score!"
        );
    }
}
