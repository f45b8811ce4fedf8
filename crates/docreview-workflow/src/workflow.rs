//! Review transitions.
//!
//! ```text
//! Idle --Select--> Loaded --Submit--> (insert) --ok--> Idle
//!                    ^  |                 |
//!                    |  +--Toggle/Page----+--err--> Loaded (checks kept)
//! ```
//!
//! [`ReviewWorkflow::apply`] takes the state by value and hands back the next
//! one, so the insert runs while the call owns the review: nothing can toggle
//! a check in the middle of a submit.

use chrono::{NaiveDateTime, Utc};
use docreview_core::{Expr, FieldDefinition, ReviewConfig, needs_review_filter};
use docreview_store::{DocumentStore, InsertOutcome};
use docreview_viewer::{PageRenderer, next_page, previous_page};
use tracing::{debug, info, warn};

use crate::session::{LoadedReview, ReviewEvent, ReviewState};
use crate::{Dashboard, ReviewError};

/// What an accepted event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Selected { file_name: String, flagged: usize },
    /// The event asked for the state already in place.
    Unchanged,
    ApprovalToggled { field: String, approved: bool },
    PageChanged { page: usize, page_count: usize },
    /// The verification is stored; the worklist must be reloaded.
    Committed {
        file_name: String,
        outcome: InsertOutcome,
    },
    Cleared,
}

/// Result of one transition. On error `state` is the state before the event.
pub struct Step<'r> {
    pub state: ReviewState<'r>,
    pub result: Result<Notice, ReviewError>,
}

impl<'r> Step<'r> {
    fn ok(state: ReviewState<'r>, notice: Notice) -> Self {
        Self {
            state,
            result: Ok(notice),
        }
    }

    fn err(state: ReviewState<'r>, error: ReviewError) -> Self {
        Self {
            state,
            result: Err(error),
        }
    }
}

pub struct ReviewWorkflow<'r, S: ?Sized, R: ?Sized> {
    store: &'r S,
    renderer: &'r R,
    fields: Vec<FieldDefinition>,
    threshold: f64,
    clock: fn() -> NaiveDateTime,
}

fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl<'r, S, R> ReviewWorkflow<'r, S, R>
where
    S: DocumentStore + ?Sized,
    R: PageRenderer + ?Sized,
{
    pub fn new(store: &'r S, renderer: &'r R, config: &ReviewConfig) -> Self {
        Self {
            store,
            renderer,
            fields: config.fields.clone(),
            threshold: config.threshold,
            clock: utc_now,
        }
    }

    /// Replace the verification timestamp source (UTC wall clock by default).
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn needs_review_filter(&self) -> Expr {
        needs_review_filter(&self.fields, self.threshold)
    }

    /// File names still needing review, read fresh from the store.
    pub fn worklist(&self) -> Result<Vec<String>, ReviewError> {
        let docs = self.store.fetch_outstanding(&self.needs_review_filter())?;
        Ok(docs.into_iter().map(|d| d.file_name).collect())
    }

    /// Metrics, per-field outstanding counts and the worklist.
    pub fn dashboard(&self) -> Result<Dashboard, ReviewError> {
        Dashboard::load(self.store, &self.fields, self.threshold)
    }

    /// Apply one operator event.
    pub fn apply(&self, state: ReviewState<'r>, event: ReviewEvent) -> Step<'r> {
        match (state, event) {
            (state, ReviewEvent::Select(file_name)) => self.select(state, file_name),
            (ReviewState::Idle, ReviewEvent::Clear) => Step::ok(ReviewState::Idle, Notice::Unchanged),
            (ReviewState::Loaded(review), ReviewEvent::Clear) => {
                info!(file_name = review.file_name(), "selection cleared");
                Step::ok(ReviewState::Idle, Notice::Cleared)
            }
            (ReviewState::Idle, _) => {
                Step::err(ReviewState::Idle, ReviewError::NoDocumentSelected)
            }
            (ReviewState::Loaded(review), ReviewEvent::ToggleApproval(field)) => {
                toggle(review, field)
            }
            (ReviewState::Loaded(mut review), ReviewEvent::NextPage) => {
                review.page = next_page(review.page, review.page_count());
                page_changed(review)
            }
            (ReviewState::Loaded(mut review), ReviewEvent::PreviousPage) => {
                review.page = previous_page(review.page);
                page_changed(review)
            }
            (ReviewState::Loaded(review), ReviewEvent::Submit) => self.submit(review),
        }
    }

    fn select(&self, state: ReviewState<'r>, file_name: String) -> Step<'r> {
        if let ReviewState::Loaded(review) = &state
            && review.file_name() == file_name
        {
            return Step::ok(state, Notice::Unchanged);
        }

        let document = match self.store.fetch_document(&file_name) {
            Ok(Some(doc)) => doc,
            Ok(None) => return Step::err(state, ReviewError::UnknownDocument(file_name)),
            Err(e) => return Step::err(state, e.into()),
        };
        // Release the previous document before opening the next one.
        drop(state);

        let viewer = self
            .store
            .fetch_document_blob(&file_name)
            .map_err(ReviewError::from)
            .and_then(|bytes| self.renderer.open(bytes).map_err(ReviewError::from));
        if let Err(e) = &viewer {
            warn!(file_name = %file_name, error = %e, "document viewer unavailable");
        }

        let review = LoadedReview::new(document, &self.fields, self.threshold, viewer);
        let flagged = review.approvals().len();
        info!(
            file_name = %file_name,
            flagged,
            pages = review.page_count(),
            "document selected"
        );
        Step::ok(
            ReviewState::Loaded(review),
            Notice::Selected { file_name, flagged },
        )
    }

    fn submit(&self, review: LoadedReview<'r>) -> Step<'r> {
        let pending = review.pending();
        if !pending.is_empty() {
            debug!(file_name = review.file_name(), ?pending, "submit blocked");
            return Step::err(
                ReviewState::Loaded(review),
                ReviewError::IncompleteApproval { pending },
            );
        }

        let at = (self.clock)();
        match self.store.insert_verification(review.file_name(), at) {
            Ok(outcome) => {
                let file_name = review.document.file_name.clone();
                match outcome {
                    InsertOutcome::Inserted => {
                        info!(file_name = %file_name, verification_date = %at, "document verified")
                    }
                    InsertOutcome::AlreadyVerified => {
                        warn!(file_name = %file_name, "document was already verified by another session")
                    }
                }
                Step::ok(
                    ReviewState::Idle,
                    Notice::Committed { file_name, outcome },
                )
            }
            Err(e) => {
                warn!(file_name = review.file_name(), error = %e, "verification insert failed");
                Step::err(ReviewState::Loaded(review), ReviewError::InsertFailure(e))
            }
        }
    }
}

fn toggle(mut review: LoadedReview<'_>, field: String) -> Step<'_> {
    let Some(i) = review.approvals.iter().position(|a| a.field == field) else {
        return Step::err(ReviewState::Loaded(review), ReviewError::UnknownField(field));
    };
    let approval = &mut review.approvals[i];
    approval.approved = !approval.approved;
    let approved = approval.approved;
    debug!(file_name = review.file_name(), field = %field, approved, "approval toggled");
    Step::ok(
        ReviewState::Loaded(review),
        Notice::ApprovalToggled { field, approved },
    )
}

fn page_changed(review: LoadedReview<'_>) -> Step<'_> {
    let notice = Notice::PageChanged {
        page: review.page,
        page_count: review.page_count(),
    };
    Step::ok(ReviewState::Loaded(review), notice)
}
