//! DDL for mirror tables.
//!
//! Mirror tables have no fixed layout: each one is created from the first
//! batch of its collection and widened by later batches. Every table carries
//! the surrogate `id` primary key and the `is_deleted` flag.

use tidemark_core::{ColumnDef, DELETED_COLUMN, ID_COLUMN};

use crate::encode::quote_ident;

/// Connection-level settings applied at startup.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
";

/// Declaration of the soft-delete flag column.
fn deleted_flag() -> String { format!("{} BOOLEAN NOT NULL DEFAULT 0", quote_ident(DELETED_COLUMN)) }

pub fn create_table(table: &str, columns: &[ColumnDef]) -> String {
  let mut decls = vec![format!("{} INTEGER PRIMARY KEY", quote_ident(ID_COLUMN))];
  decls.extend(
    columns
      .iter()
      .filter(|c| c.name != ID_COLUMN && c.name != DELETED_COLUMN)
      .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.sql())),
  );
  decls.push(deleted_flag());
  format!("CREATE TABLE {} (\n  {}\n)", quote_ident(table), decls.join(",\n  "))
}

/// Non-unique index on the natural key. Several rows may share a key.
pub fn create_key_index(table: &str, key_column: &str) -> String {
  format!(
    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
    quote_ident(&format!("{table}_{key_column}_idx")),
    quote_ident(table),
    quote_ident(key_column),
  )
}

pub fn add_column(table: &str, column: &ColumnDef) -> String {
  format!(
    "ALTER TABLE {} ADD COLUMN {} {}",
    quote_ident(table),
    quote_ident(&column.name),
    column.ty.sql(),
  )
}

pub fn add_deleted_flag(table: &str) -> String {
  format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table), deleted_flag())
}

#[cfg(test)]
mod tests {
  use tidemark_core::ColumnType;

  use super::*;

  #[test]
  fn create_table_wraps_columns_with_bookkeeping() {
    let sql = create_table("orders", &[
      ColumnDef::new("_id", ColumnType::Varchar(60)),
      ColumnDef::new("total", ColumnType::Decimal),
    ]);
    assert_eq!(
      sql,
      "CREATE TABLE \"orders\" (\n  \"id\" INTEGER PRIMARY KEY,\n  \"_id\" VARCHAR(60),\n  \
       \"total\" DECIMAL(20,6),\n  \"is_deleted\" BOOLEAN NOT NULL DEFAULT 0\n)"
    );
  }

  #[test]
  fn key_index_is_named_after_table_and_column() {
    assert_eq!(
      create_key_index("orders", "_id"),
      "CREATE INDEX IF NOT EXISTS \"orders__id_idx\" ON \"orders\" (\"_id\")"
    );
  }
}
