//! Data access: the `DocumentStore` capability, SQL translation of review
//! queries, Arrow row decoding, and the DuckDB and in-memory backends.

mod decode;
mod error;
mod memory;
mod source;
pub mod sql;

pub use decode::decode_documents;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use source::{DocumentStore, InsertOutcome, Relation, resolve_blob_path};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
