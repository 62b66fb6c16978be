//! Error type for `tidemark-source-json`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot read {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON in {path}: {source}")]
  Json {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// A collection entry that is not a JSON object.
  #[error("expected a document, found {0}")]
  NotADocument(&'static str),

  #[error("invalid $date value: {0}")]
  InvalidDate(String),

  #[error("invalid {wrapper} value: {value}")]
  InvalidNumber { wrapper: &'static str, value: String },

  #[error("no collection named {0:?}")]
  UnknownCollection(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
