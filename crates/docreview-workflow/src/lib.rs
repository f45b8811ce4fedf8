//! Review workflow: worklist and dashboard figures, and the per-document
//! review session driven by operator events.

mod dashboard;
mod error;
mod session;
mod workflow;

pub use dashboard::Dashboard;
pub use error::ReviewError;
pub use session::{Approval, FieldRow, LoadedReview, ReviewEvent, ReviewState};
pub use workflow::{Notice, ReviewWorkflow, Step};
