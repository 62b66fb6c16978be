//! Error type for `tidemark-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  /// A nested mapping or sequence reached the store unflattened.
  #[error("cannot store nested value: {0}")]
  UnsupportedValue(String),

  #[error("table {table:?} has no column {column:?}")]
  UnknownColumn { table: String, column: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
