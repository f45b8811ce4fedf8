pub mod config;
pub mod document;
pub mod query;

pub use config::{ConfigError, ReviewConfig};
pub use document::{DocumentRecord, FieldDefinition, FieldReading, FlagReason};
pub use query::{CountSpec, Expr, needs_review_filter, per_field_missing_counts};
