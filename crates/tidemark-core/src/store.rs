//! The `Destination` and `DocumentSource` traits.
//!
//! Storage backends (e.g. `tidemark-store-sqlite`) implement
//! [`Destination`]; document stores (e.g. `tidemark-source-json`) implement
//! [`DocumentSource`]. The flattening and reconciliation logic in this crate
//! depends only on these abstractions.
//!
//! Every destination table carries two bookkeeping columns besides its data
//! columns: the integer surrogate key [`ID_COLUMN`](crate::ID_COLUMN) and the
//! boolean soft-delete flag [`DELETED_COLUMN`](crate::DELETED_COLUMN).

use crate::{ColumnDef, Document, Value};

// ─── Row type ────────────────────────────────────────────────────────────────

/// A destination row as read back for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
  pub id:      i64,
  pub deleted: bool,
  /// Values of the requested columns, in request order.
  pub values:  Vec<Value>,
}

// ─── Destination ─────────────────────────────────────────────────────────────

/// A relational store holding one table per collection.
///
/// Methods are blocking. Grouping statements into a transaction is the
/// implementor's concern; the core issues them in order and never deletes a
/// row.
pub trait Destination {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Structure ─────────────────────────────────────────────────────────

  fn table_exists(&self, table: &str) -> Result<bool, Self::Error>;

  /// Create `table` with a surrogate primary key, `columns`, and a
  /// soft-delete flag defaulting to `false`. When `key_column` is given a
  /// secondary index is created on it.
  fn create_table(
    &self,
    table: &str,
    columns: &[ColumnDef],
    key_column: Option<&str>,
  ) -> Result<(), Self::Error>;

  /// All columns of `table`, bookkeeping columns included, in table order.
  fn table_columns(&self, table: &str) -> Result<Vec<ColumnDef>, Self::Error>;

  fn add_column(&self, table: &str, column: &ColumnDef) -> Result<(), Self::Error>;

  /// Add the soft-delete flag column, defaulting to `false`.
  fn add_deleted_flag(&self, table: &str) -> Result<(), Self::Error>;

  fn index_exists(&self, table: &str, index: &str) -> Result<bool, Self::Error>;

  fn drop_index(&self, table: &str, index: &str) -> Result<(), Self::Error>;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every row (active or soft-deleted) whose `key_column` equals `key`,
  /// ordered by ascending surrogate id.
  fn rows_for_key(
    &self,
    table: &str,
    key_column: &str,
    key: &Value,
    columns: &[ColumnDef],
  ) -> Result<Vec<StoredRow>, Self::Error>;

  /// Distinct key values (as canonical text) of all active rows.
  fn active_keys(&self, table: &str, key_column: &str) -> Result<Vec<String>, Self::Error>;

  /// `MAX(column)`, decoded as `column`'s type; `None` for an empty table.
  fn max_value(&self, table: &str, column: &ColumnDef) -> Result<Option<Value>, Self::Error>;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Next surrogate id: one past the current table-wide maximum.
  fn allocate_id(&self, table: &str) -> Result<i64, Self::Error>;

  fn insert_row(
    &self,
    table: &str,
    id: i64,
    columns: &[String],
    values: &[Value],
  ) -> Result<(), Self::Error>;

  /// Clear the soft-delete flag of row `id`, optionally setting one extra
  /// column (the last-modified field) at the same time.
  fn reactivate(
    &self,
    table: &str,
    id: i64,
    modified: Option<(&str, &Value)>,
  ) -> Result<(), Self::Error>;

  /// Overwrite `columns` of row `id` with `values` and clear its flag.
  fn overwrite_row(
    &self,
    table: &str,
    id: i64,
    columns: &[String],
    values: &[Value],
  ) -> Result<(), Self::Error>;

  fn soft_delete_ids(&self, table: &str, ids: &[i64]) -> Result<(), Self::Error>;

  /// Soft-delete every active row whose key (as text) is in `keys`. Returns
  /// the number of rows flagged.
  fn soft_delete_keys(
    &self,
    table: &str,
    key_column: &str,
    keys: &[String],
  ) -> Result<usize, Self::Error>;
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// A document store organised into named collections. Read-only.
pub trait DocumentSource {
  type Error: std::error::Error + Send + Sync + 'static;

  fn collections(&self) -> Result<Vec<String>, Self::Error>;

  /// Documents whose `modified_field` is strictly greater than `watermark`,
  /// or every document when `watermark` is `None`.
  fn changed_since(
    &self,
    collection: &str,
    modified_field: &str,
    watermark: Option<&Value>,
  ) -> Result<Vec<Document>, Self::Error>;

  /// Canonical text of every natural key present in the collection.
  fn keys(&self, collection: &str, key_field: &str) -> Result<Vec<String>, Self::Error>;
}
