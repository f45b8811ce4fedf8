use std::sync::Arc;

use docreview_store::StoreError;
use docreview_viewer::ViewerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Need to approve all checks before saving (pending: {})", .pending.join(", "))]
    IncompleteApproval { pending: Vec<String> },

    #[error("no document selected")]
    NoDocumentSelected,

    #[error("document {0} not found")]
    UnknownDocument(String),

    #[error("field {0} has no approval check on this document")]
    UnknownField(String),

    #[error("saving the verification failed: {0}")]
    InsertFailure(#[source] StoreError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    /// The document could not be opened when it was selected.
    #[error("document viewer unavailable")]
    ViewerUnavailable(#[source] Arc<ReviewError>),

    #[error(transparent)]
    Store(#[from] StoreError),
}
