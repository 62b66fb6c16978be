//! SQLite destination for the tidemark mirror.
//!
//! Each collection maps to one table. Statements run on a plain blocking
//! [`rusqlite::Connection`]; a load or sweep of one collection is one
//! [`SqliteTx`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, SqliteTx};
