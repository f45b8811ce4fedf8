//! Review session state: which document is selected, its field rows, the
//! approval checks and the page viewer.

use std::sync::Arc;

use docreview_core::{DocumentRecord, FieldDefinition, FieldReading, FlagReason};
use docreview_viewer::{OpenDocument, PageImage, page_label};

use crate::ReviewError;

/// Operator actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    Select(String),
    ToggleApproval(String),
    NextPage,
    PreviousPage,
    Submit,
    Clear,
}

/// One line of the field form. Unflagged rows are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub field: FieldDefinition,
    pub reading: FieldReading,
    pub flag: Option<FlagReason>,
}

/// Approval check for one flagged field, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub field: String,
    pub reason: FlagReason,
    pub approved: bool,
}

pub enum ReviewState<'r> {
    Idle,
    Loaded(LoadedReview<'r>),
}

impl<'r> ReviewState<'r> {
    pub fn loaded(&self) -> Option<&LoadedReview<'r>> {
        match self {
            ReviewState::Loaded(review) => Some(review),
            ReviewState::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ReviewState::Idle)
    }
}

/// A selected document under review.
pub struct LoadedReview<'r> {
    pub(crate) document: DocumentRecord,
    pub(crate) rows: Vec<FieldRow>,
    pub(crate) approvals: Vec<Approval>,
    /// The open document, or why it could not be opened.
    pub(crate) viewer: Result<Box<dyn OpenDocument + 'r>, Arc<ReviewError>>,
    pub(crate) page: usize,
}

impl<'r> LoadedReview<'r> {
    pub(crate) fn new(
        document: DocumentRecord,
        fields: &[FieldDefinition],
        threshold: f64,
        viewer: Result<Box<dyn OpenDocument + 'r>, ReviewError>,
    ) -> Self {
        let rows: Vec<FieldRow> = fields
            .iter()
            .map(|f| FieldRow {
                field: f.clone(),
                reading: document.reading(&f.name).cloned().unwrap_or_default(),
                flag: document.flag_reason(f, threshold),
            })
            .collect();
        let approvals = rows
            .iter()
            .filter_map(|r| {
                r.flag.map(|reason| Approval {
                    field: r.field.name.clone(),
                    reason,
                    approved: false,
                })
            })
            .collect();
        Self {
            document,
            rows,
            approvals,
            viewer: viewer.map_err(Arc::new),
            page: 0,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.document.file_name
    }

    pub fn document(&self) -> &DocumentRecord {
        &self.document
    }

    /// All fields, in field-definition order.
    pub fn rows(&self) -> &[FieldRow] {
        &self.rows
    }

    /// Approval checks for the flagged fields, in field-definition order.
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    pub fn is_approved(&self, field: &str) -> bool {
        self.approvals
            .iter()
            .any(|a| a.field == field && a.approved)
    }

    /// Flagged fields whose check is still clear.
    pub fn pending(&self) -> Vec<String> {
        self.approvals
            .iter()
            .filter(|a| !a.approved)
            .map(|a| a.field.clone())
            .collect()
    }

    /// Name of the `position`-th (1-based) flagged field, for numbered UIs.
    pub fn flagged_field_at(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.approvals.get(i))
            .map(|a| a.field.as_str())
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Zero when the document could not be opened.
    pub fn page_count(&self) -> usize {
        self.viewer.as_ref().map_or(0, |v| v.page_count())
    }

    pub fn page_label(&self) -> String {
        page_label(self.page, self.page_count())
    }

    /// Why the viewer could not be opened: a store error for a missing or
    /// unreadable blob, a viewer error for a bad document or renderer.
    pub fn viewer_error(&self) -> Option<&ReviewError> {
        self.viewer.as_ref().err().map(|e| &**e)
    }

    /// Render the current page. Without a viewer this fails with
    /// [`ReviewError::ViewerUnavailable`] carrying the open failure.
    pub fn render_current_page(&self, scale: f32) -> Result<PageImage, ReviewError> {
        match &self.viewer {
            Ok(viewer) => Ok(viewer.render_page(self.page, scale)?),
            Err(cause) => Err(ReviewError::ViewerUnavailable(Arc::clone(cause))),
        }
    }
}
