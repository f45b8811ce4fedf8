use docreview_core::{FieldDefinition, needs_review_filter, per_field_missing_counts};
use docreview_store::{DocumentStore, Relation};
use serde::Serialize;
use tracing::debug;

use crate::ReviewError;

/// Figures shown above the worklist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_documents: usize,
    /// Documents needing review.
    pub outstanding: usize,
    /// Outstanding documents with each field missing or below threshold,
    /// in field-definition order.
    pub per_field: Vec<(String, u64)>,
    pub worklist: Vec<String>,
}

impl Dashboard {
    /// Read every figure fresh from the store.
    pub fn load<S>(store: &S, fields: &[FieldDefinition], threshold: f64) -> Result<Self, ReviewError>
    where
        S: DocumentStore + ?Sized,
    {
        let filter = needs_review_filter(fields, threshold);
        let total_documents = store.count_rows(&Relation::All)?;
        let worklist: Vec<String> = store
            .fetch_outstanding(&filter)?
            .into_iter()
            .map(|d| d.file_name)
            .collect();
        let outstanding = Relation::Filtered(filter);
        let outstanding_count = store.count_rows(&outstanding)?;
        let per_field = store.aggregate(&outstanding, &per_field_missing_counts(fields, threshold))?;
        debug!(total_documents, outstanding = outstanding_count, "dashboard loaded");
        Ok(Self {
            total_documents,
            outstanding: outstanding_count,
            per_field,
            worklist,
        })
    }

    pub fn verified(&self) -> usize {
        self.total_documents.saturating_sub(self.outstanding)
    }

    /// Largest per-field count, for scaling charts.
    pub fn max_field_count(&self) -> u64 {
        self.per_field.iter().map(|(_, n)| *n).max().unwrap_or(0)
    }
}
