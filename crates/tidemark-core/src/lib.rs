//! Core of the tidemark document-to-relational mirror.
//!
//! Turns batches of nested documents into flat rows and reconciles them
//! against a relational table: schema evolution, fingerprint matching, slot
//! reuse and soft deletion. Storage and document access sit behind the
//! traits in [`store`]; this crate performs no I/O itself.

pub mod column;
pub mod error;
pub mod fingerprint;
pub mod flatten;
pub mod load;
pub mod reconcile;
pub mod rowset;
pub mod schema;
pub mod store;
pub mod sweep;
pub mod value;

pub use column::{ColumnDef, ColumnType};
pub use error::{Error, Result};
pub use load::{LoadOptions, LoadReport, load_documents, watermark};
pub use rowset::RowSet;
pub use store::{Destination, DocumentSource, StoredRow};
pub use sweep::{SweepOutcome, sweep_deleted};
pub use value::{Document, Value};

/// Surrogate primary key column of every destination table.
pub const ID_COLUMN: &str = "id";

/// Soft-delete flag column of every destination table.
pub const DELETED_COLUMN: &str = "is_deleted";
