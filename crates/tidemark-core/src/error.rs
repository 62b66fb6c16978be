//! Error types for `tidemark-core`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("duplicate column after flattening: {0}")]
  DuplicateColumn(String),

  #[error("column {0:?} collides with a bookkeeping column")]
  ReservedColumn(String),

  #[error("row {row} has {found} values, expected {expected}")]
  RaggedRow {
    row:      usize,
    expected: usize,
    found:    usize,
  },

  #[error("destination error: {0}")]
  Destination(#[source] BoxError),

  #[error("source error: {0}")]
  Source(#[source] BoxError),
}

impl Error {
  pub fn destination(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Destination(Box::new(e))
  }

  pub fn document_source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
