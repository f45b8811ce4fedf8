//! In-memory `DocumentStore`, evaluating expressions directly on records.
//!
//! Used as the test double for the review workflow and as the reference the
//! SQL translation is checked against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use docreview_core::{CountSpec, DocumentRecord, Expr};
use tracing::info;

use crate::{DocumentStore, InsertOutcome, Relation, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<DocumentRecord>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    inserts: Mutex<Vec<(String, NaiveDateTime)>>,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new(documents: Vec<DocumentRecord>) -> Self {
        Self {
            documents: Mutex::new(documents),
            ..Self::default()
        }
    }

    pub fn with_blob(self, file_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(file_name.to_string(), bytes.into());
        }
        self
    }

    /// Make every following `insert_verification` fail until reset.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Verifications written through this store, in order.
    pub fn inserted(&self) -> Vec<(String, NaiveDateTime)> {
        self.inserts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn select(&self, relation: &Relation) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut docs: Vec<DocumentRecord> = lock(&self.documents)?
            .iter()
            .filter(|d| match relation {
                Relation::All => true,
                Relation::Filtered(expr) => expr.evaluate(d),
            })
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(docs)
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    m.lock()
        .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
}

impl DocumentStore for MemoryStore {
    fn fetch_all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        self.select(&Relation::All)
    }

    fn fetch_outstanding(&self, filter: &Expr) -> Result<Vec<DocumentRecord>, StoreError> {
        self.select(&Relation::Filtered(filter.clone()))
    }

    fn fetch_document(&self, file_name: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(lock(&self.documents)?
            .iter()
            .find(|d| d.file_name == file_name)
            .cloned())
    }

    fn count_rows(&self, relation: &Relation) -> Result<usize, StoreError> {
        Ok(self.select(relation)?.len())
    }

    fn aggregate(
        &self,
        relation: &Relation,
        counts: &[CountSpec],
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let docs = self.select(relation)?;
        Ok(counts
            .iter()
            .map(|c| (c.label.clone(), c.tally(&docs)))
            .collect())
    }

    fn is_verified(&self, file_name: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.documents)?
            .iter()
            .any(|d| d.file_name == file_name && d.is_verified()))
    }

    fn insert_verification(
        &self,
        file_name: &str,
        at: NaiveDateTime,
    ) -> Result<InsertOutcome, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Other("insert rejected by store".into()));
        }
        let mut docs = lock(&self.documents)?;
        let doc = docs
            .iter_mut()
            .find(|d| d.file_name == file_name)
            .ok_or(StoreError::NoResults)?;
        if doc.is_verified() {
            return Ok(InsertOutcome::AlreadyVerified);
        }
        doc.verification_date = Some(at);
        lock(&self.inserts)?.push((file_name.to_string(), at));
        info!(file_name, "verification recorded");
        Ok(InsertOutcome::Inserted)
    }

    fn fetch_document_blob(&self, file_name: &str) -> Result<Vec<u8>, StoreError> {
        lock(&self.blobs)?
            .get(file_name)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(file_name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use docreview_core::{FieldDefinition, needs_review_filter, per_field_missing_counts};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            DocumentRecord::new("B.pdf").with_reading("EFFECTIVE_DATE", Some("2024-01-01"), Some(0.3)),
            DocumentRecord::new("A.pdf").with_reading("EFFECTIVE_DATE", None, None),
            DocumentRecord::new("C.pdf").with_reading("EFFECTIVE_DATE", Some("2024-02-02"), Some(0.9)),
        ])
        .with_blob("A.pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn outstanding_sorted_and_filtered() {
        let filter = needs_review_filter(&[FieldDefinition::new("EFFECTIVE_DATE")], 0.5);
        let names: Vec<String> = store()
            .fetch_outstanding(&filter)
            .unwrap()
            .into_iter()
            .map(|d| d.file_name)
            .collect();
        assert_eq!(names, vec!["A.pdf", "B.pdf"]);
    }

    #[test]
    fn second_insert_is_benign_duplicate() {
        let store = store();
        assert_eq!(
            store.insert_verification("A.pdf", now()).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_verification("A.pdf", now()).unwrap(),
            InsertOutcome::AlreadyVerified
        );
        assert_eq!(store.inserted().len(), 1);
        assert!(store.is_verified("A.pdf").unwrap());
    }

    #[test]
    fn aggregate_over_outstanding() {
        let fields = [FieldDefinition::new("EFFECTIVE_DATE")];
        let store = store();
        let rel = Relation::Filtered(needs_review_filter(&fields, 0.5));
        let counts = store
            .aggregate(&rel, &per_field_missing_counts(&fields, 0.5))
            .unwrap();
        assert_eq!(counts, vec![("EFFECTIVE_DATE".to_string(), 2)]);
        assert_eq!(store.count_rows(&Relation::All).unwrap(), 3);
    }

    #[test]
    fn failing_inserts() {
        let store = store();
        store.set_fail_inserts(true);
        assert!(store.insert_verification("A.pdf", now()).is_err());
        assert!(!store.is_verified("A.pdf").unwrap());
    }

    #[test]
    fn blob_lookup() {
        let store = store();
        assert_eq!(store.fetch_document_blob("A.pdf").unwrap(), b"%PDF-1.7");
        assert!(matches!(
            store.fetch_document_blob("B.pdf"),
            Err(StoreError::BlobNotFound(_))
        ));
    }
}
