//! [`SqliteStore`] and [`SqliteTx`], the SQLite implementation of
//! [`Destination`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, params_from_iter, types::Value as SqlOwned};
use tidemark_core::{ColumnDef, ColumnType, DELETED_COLUMN, Destination, ID_COLUMN, StoredRow, Value};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{SqlValue, column_list, decode_value, placeholders, quote_ident},
  schema,
};

/// Upper bound on bound parameters per `IN (…)` statement.
const IN_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A mirror database held in a single SQLite file.
///
/// All writes go through a [`SqliteTx`] obtained from [`SqliteStore::begin`].
pub struct SqliteStore {
  pub(crate) conn: rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::init(rusqlite::Connection::open(path)?)
  }

  /// Open an in-memory store, useful for testing.
  pub fn open_in_memory() -> Result<Self> {
    Self::init(rusqlite::Connection::open_in_memory()?)
  }

  fn init(conn: rusqlite::Connection) -> Result<Self> {
    conn.execute_batch(schema::PRAGMAS)?;
    Ok(Self { conn })
  }

  /// Start a transaction. Nothing it writes is visible until
  /// [`SqliteTx::commit`]; dropping it rolls back.
  pub fn begin(&mut self) -> Result<SqliteTx<'_>> {
    Ok(SqliteTx { tx: self.conn.transaction()? })
  }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// One unit of work against a [`SqliteStore`].
pub struct SqliteTx<'c> {
  tx: rusqlite::Transaction<'c>,
}

impl SqliteTx<'_> {
  pub fn commit(self) -> Result<()> {
    self.tx.commit()?;
    Ok(())
  }

  fn column_type(&self, table: &str, column: &str) -> Result<ColumnType> {
    self
      .table_columns(table)?
      .into_iter()
      .find(|c| c.name == column)
      .map(|c| c.ty)
      .ok_or_else(|| Error::UnknownColumn {
        table:  table.to_owned(),
        column: column.to_owned(),
      })
  }
}

impl Destination for SqliteTx<'_> {
  type Error = Error;

  // ── Structure ─────────────────────────────────────────────────────────

  fn table_exists(&self, table: &str) -> Result<bool> {
    let found = self
      .tx
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
      )
      .optional()?;
    Ok(found.is_some())
  }

  fn create_table(&self, table: &str, columns: &[ColumnDef], key_column: Option<&str>) -> Result<()> {
    self.tx.execute(&schema::create_table(table, columns), [])?;
    if let Some(key) = key_column {
      self.tx.execute(&schema::create_key_index(table, key), [])?;
    }
    Ok(())
  }

  fn table_columns(&self, table: &str) -> Result<Vec<ColumnDef>> {
    let mut stmt = self
      .tx
      .prepare_cached("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
      .query_map([table], |row| {
        let name: String = row.get(0)?;
        let declared: String = row.get(1)?;
        Ok(ColumnDef::new(name, ColumnType::from_sql(&declared)))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
  }

  fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
    self.tx.execute(&schema::add_column(table, column), [])?;
    Ok(())
  }

  fn add_deleted_flag(&self, table: &str) -> Result<()> {
    self.tx.execute(&schema::add_deleted_flag(table), [])?;
    Ok(())
  }

  fn index_exists(&self, table: &str, index: &str) -> Result<bool> {
    let found = self
      .tx
      .query_row(
        "SELECT 1 FROM pragma_index_list(?1) WHERE name = ?2",
        [table, index],
        |_| Ok(()),
      )
      .optional()?;
    Ok(found.is_some())
  }

  fn drop_index(&self, _table: &str, index: &str) -> Result<()> {
    self
      .tx
      .execute(&format!("DROP INDEX IF EXISTS {}", quote_ident(index)), [])?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  fn rows_for_key(
    &self,
    table: &str,
    key_column: &str,
    key: &Value,
    columns: &[ColumnDef],
  ) -> Result<Vec<StoredRow>> {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let sql = format!(
      "SELECT {}, {}, {} FROM {} WHERE {} = ?1 ORDER BY {}",
      quote_ident(ID_COLUMN),
      quote_ident(DELETED_COLUMN),
      column_list(&names),
      quote_ident(table),
      quote_ident(key_column),
      quote_ident(ID_COLUMN),
    );
    let mut stmt = self.tx.prepare_cached(&sql)?;
    let rows = stmt
      .query_map([SqlValue(key)], |row| {
        let mut values = Vec::with_capacity(columns.len());
        for (offset, column) in columns.iter().enumerate() {
          values.push(decode_value(row.get_ref(offset + 2)?, column.ty));
        }
        Ok(StoredRow {
          id: row.get(0)?,
          deleted: row.get::<_, Option<bool>>(1)?.unwrap_or(false),
          values,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn active_keys(&self, table: &str, key_column: &str) -> Result<Vec<String>> {
    let ty = self.column_type(table, key_column)?;
    let key = quote_ident(key_column);
    let sql = format!(
      "SELECT DISTINCT {key} FROM {} WHERE {} = 0 AND {key} IS NOT NULL",
      quote_ident(table),
      quote_ident(DELETED_COLUMN),
    );
    let mut stmt = self.tx.prepare(&sql)?;
    let keys = stmt
      .query_map([], |row| Ok(decode_value(row.get_ref(0)?, ty).canonical()))?
      .filter_map(|k| k.transpose())
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
  }

  fn max_value(&self, table: &str, column: &ColumnDef) -> Result<Option<Value>> {
    let sql = format!("SELECT MAX({}) FROM {}", quote_ident(&column.name), quote_ident(table));
    let value = self
      .tx
      .query_row(&sql, [], |row| Ok(decode_value(row.get_ref(0)?, column.ty)))?;
    Ok(Some(value).filter(|v| !v.is_null()))
  }

  // ── Writes ────────────────────────────────────────────────────────────

  fn allocate_id(&self, table: &str) -> Result<i64> {
    let sql = format!(
      "SELECT COALESCE(MAX({}), 0) + 1 FROM {}",
      quote_ident(ID_COLUMN),
      quote_ident(table)
    );
    Ok(self.tx.query_row(&sql, [], |row| row.get(0))?)
  }

  fn insert_row(&self, table: &str, id: i64, columns: &[String], values: &[Value]) -> Result<()> {
    let sql = format!(
      "INSERT INTO {} ({}, {}) VALUES ({})",
      quote_ident(table),
      quote_ident(ID_COLUMN),
      column_list(columns),
      placeholders(1, columns.len() + 1),
    );
    let id = Value::Int(id);
    let params = std::iter::once(&id).chain(values).map(SqlValue);
    self.tx.prepare_cached(&sql)?.execute(params_from_iter(params))?;
    Ok(())
  }

  fn reactivate(&self, table: &str, id: i64, modified: Option<(&str, &Value)>) -> Result<()> {
    let deleted = quote_ident(DELETED_COLUMN);
    let id_col = quote_ident(ID_COLUMN);
    match modified {
      Some((column, value)) => {
        let sql = format!(
          "UPDATE {} SET {deleted} = 0, {} = ?2 WHERE {id_col} = ?1",
          quote_ident(table),
          quote_ident(column),
        );
        self.tx.prepare_cached(&sql)?.execute((id, SqlValue(value)))?;
      }
      None => {
        let sql = format!("UPDATE {} SET {deleted} = 0 WHERE {id_col} = ?1", quote_ident(table));
        self.tx.prepare_cached(&sql)?.execute([id])?;
      }
    }
    Ok(())
  }

  fn overwrite_row(&self, table: &str, id: i64, columns: &[String], values: &[Value]) -> Result<()> {
    let assignments = columns
      .iter()
      .enumerate()
      .map(|(i, c)| format!("{} = ?{}", quote_ident(c), i + 2))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "UPDATE {} SET {assignments}, {} = 0 WHERE {} = ?1",
      quote_ident(table),
      quote_ident(DELETED_COLUMN),
      quote_ident(ID_COLUMN),
    );
    let id_value = Value::Int(id);
    let params = std::iter::once(&id_value).chain(values).map(SqlValue);
    self.tx.prepare_cached(&sql)?.execute(params_from_iter(params))?;
    debug!(table, id, "slot overwritten");
    Ok(())
  }

  fn soft_delete_ids(&self, table: &str, ids: &[i64]) -> Result<()> {
    for chunk in ids.chunks(IN_CHUNK) {
      let sql = format!(
        "UPDATE {} SET {} = 1 WHERE {} IN ({})",
        quote_ident(table),
        quote_ident(DELETED_COLUMN),
        quote_ident(ID_COLUMN),
        placeholders(1, chunk.len()),
      );
      self.tx.execute(&sql, params_from_iter(chunk))?;
    }
    Ok(())
  }

  fn soft_delete_keys(&self, table: &str, key_column: &str, keys: &[String]) -> Result<usize> {
    let ty = self.column_type(table, key_column)?;
    let mut flagged = 0;
    for chunk in keys.chunks(IN_CHUNK) {
      let sql = format!(
        "UPDATE {} SET {deleted} = 1 WHERE {} IN ({}) AND {deleted} = 0",
        quote_ident(table),
        quote_ident(key_column),
        placeholders(1, chunk.len()),
        deleted = quote_ident(DELETED_COLUMN),
      );
      let params: Vec<SqlOwned> = chunk.iter().map(|k| key_param(k, ty)).collect();
      flagged += self.tx.execute(&sql, params_from_iter(params))?;
    }
    Ok(flagged)
  }
}

/// Bind a canonical key string with the storage class its column uses.
fn key_param(key: &str, ty: ColumnType) -> SqlOwned {
  match ty {
    ColumnType::BigInt | ColumnType::Decimal | ColumnType::Boolean => key
      .parse::<i64>()
      .map(SqlOwned::Integer)
      .or_else(|_| key.parse::<f64>().map(SqlOwned::Real))
      .unwrap_or_else(|_| SqlOwned::Text(key.to_owned())),
    _ => SqlOwned::Text(key.to_owned()),
  }
}
