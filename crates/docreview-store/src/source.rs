//! The data-access capability the review workflow is written against.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDateTime;
use docreview_core::{CountSpec, DocumentRecord, Expr};

use crate::StoreError;

/// Which rows of the joined document relation an operation sees.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    All,
    Filtered(Expr),
}

/// Result of recording a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another session already verified this document; nothing was written.
    AlreadyVerified,
}

/// Read/append access to extracted documents and their verification records.
///
/// Every read goes to the backing data; implementations must not cache rows
/// across calls.
pub trait DocumentStore {
    /// Every document, verified or not, ordered by file name.
    fn fetch_all_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Documents matching `filter`, ordered by file name.
    fn fetch_outstanding(&self, filter: &Expr) -> Result<Vec<DocumentRecord>, StoreError>;

    fn fetch_document(&self, file_name: &str) -> Result<Option<DocumentRecord>, StoreError>;

    fn count_rows(&self, relation: &Relation) -> Result<usize, StoreError>;

    /// One `(label, count)` per `CountSpec`, in the given order.
    fn aggregate(
        &self,
        relation: &Relation,
        counts: &[CountSpec],
    ) -> Result<Vec<(String, u64)>, StoreError>;

    fn is_verified(&self, file_name: &str) -> Result<bool, StoreError>;

    /// Append a verification record. Never overwrites an existing one.
    fn insert_verification(
        &self,
        file_name: &str,
        at: NaiveDateTime,
    ) -> Result<InsertOutcome, StoreError>;

    /// Raw bytes of the source document.
    fn fetch_document_blob(&self, file_name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Path of `file_name` inside the stage directory.
///
/// Only a single plain path component is accepted.
pub fn resolve_blob_path(stage_dir: &Path, file_name: &str) -> Result<PathBuf, StoreError> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if !file_name.contains(['/', '\\']) => {
            Ok(stage_dir.join(name))
        }
        _ => Err(StoreError::InvalidFileName(file_name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_resolves_inside_stage() {
        let path = resolve_blob_path(Path::new("/stage"), "A.pdf").unwrap();
        assert_eq!(path, PathBuf::from("/stage/A.pdf"));
    }

    #[test]
    fn traversal_rejected() {
        for bad in ["../secret.pdf", "/etc/passwd", "sub/A.pdf", "..", "", "a\\b.pdf"] {
            assert!(
                matches!(
                    resolve_blob_path(Path::new("/stage"), bad),
                    Err(StoreError::InvalidFileName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
