//! JSON-export document source for the tidemark mirror.
//!
//! Reads a directory of collection exports: `<collection>.json` holding an
//! array of documents, or `<collection>.jsonl` holding one document per
//! line. Extended-JSON scalar wrappers are unwrapped on the way in.

pub mod error;
pub mod extended;
mod source;

pub use error::{Error, Result};
pub use source::{JsonDirSource, compare};
