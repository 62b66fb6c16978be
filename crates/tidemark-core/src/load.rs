//! Loading one collection's batch of changed documents into its table.
//!
//! Pipeline: documents → [`RowSet`] → [`flatten`] → column sanitising →
//! type inference → [`ensure_schema`] → value normalisation → either
//! [`reconcile`] (natural key present) or [`append_rows`].

use tracing::info;

use crate::{
  ColumnDef, DELETED_COLUMN, Destination, Document, Error, ID_COLUMN, Result, RowSet, Value,
  column::infer_column_type,
  flatten::flatten,
  reconcile::{ReconcileStats, append_rows, reconcile},
  schema::{SchemaChange, ensure_schema},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Names of the conventional source fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
  /// Natural-key field; reconciliation happens per value of this field.
  pub key_field:      String,
  /// Last-modified field; excluded from fingerprints, drives the watermark.
  pub modified_field: String,
}

impl Default for LoadOptions {
  fn default() -> Self {
    Self {
      key_field:      "_id".to_owned(),
      modified_field: "updated_at".to_owned(),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What a [`load_documents`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
  pub documents: usize,
  /// Flattened rows written or matched.
  pub rows:      usize,
  pub schema:    SchemaChange,
  pub stats:     ReconcileStats,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Make a column name safe for the destination: `.`, space and `-` become
/// `_`, and `$` is dropped.
pub fn sanitize_column_name(name: &str) -> String {
  name.replace(['.', ' ', '-'], "_").replace('$', "")
}

/// Flatten `docs` and apply them to `table`.
pub fn load_documents<D: Destination>(
  dest: &D,
  table: &str,
  docs: Vec<Document>,
  opts: &LoadOptions,
) -> Result<LoadReport> {
  let mut report = LoadReport { documents: docs.len(), ..Default::default() };

  let set = prepare(flatten(RowSet::from_documents(docs))?)?;
  if set.is_empty() || set.columns().is_empty() {
    info!(table, "no rows after flattening");
    return Ok(report);
  }
  report.rows = set.len();

  let key_field = sanitize_column_name(&opts.key_field);
  let modified_field = sanitize_column_name(&opts.modified_field);
  let key_column = set.column_index(&key_field).map(|_| key_field.as_str());

  let inferred: Vec<ColumnDef> = set
    .columns()
    .iter()
    .enumerate()
    .map(|(idx, name)| ColumnDef::new(name, infer_column_type(set.column_values(idx))))
    .collect();

  report.schema = ensure_schema(dest, table, &inferred, key_column)?;

  let columns = destination_types(dest, table, inferred)?;
  let set = normalize(set, &columns);

  report.stats = match key_column {
    Some(key) => reconcile(dest, table, &set, &columns, key, &modified_field)?,
    None => ReconcileStats {
      appended: append_rows(dest, table, set.columns(), set.rows().iter())?,
      ..Default::default()
    },
  };

  info!(
    table,
    rows = report.rows,
    matched = report.stats.matched,
    revived = report.stats.revived,
    overwritten = report.stats.overwritten,
    inserted = report.stats.inserted,
    soft_deleted = report.stats.soft_deleted,
    appended = report.stats.appended,
    "batch loaded"
  );

  Ok(report)
}

/// Sanitise column names, reject bookkeeping names, and null out empty
/// sequences left behind by flattening.
fn prepare(mut set: RowSet) -> Result<RowSet> {
  set.rename_columns(sanitize_column_name)?;

  if let Some(reserved) = set
    .columns()
    .iter()
    .find(|c| *c == ID_COLUMN || *c == DELETED_COLUMN)
  {
    return Err(Error::ReservedColumn(reserved.clone()));
  }

  set.map_values(|v| match v {
    Value::Array(items) if items.is_empty() => Value::Null,
    other => other,
  });
  Ok(set)
}

/// The batch's columns typed as the destination table declares them. Types
/// of pre-existing columns win over this batch's inference.
fn destination_types<D: Destination>(
  dest: &D,
  table: &str,
  inferred: Vec<ColumnDef>,
) -> Result<Vec<ColumnDef>> {
  let existing = dest.table_columns(table).map_err(Error::destination)?;
  Ok(
    inferred
      .into_iter()
      .map(|col| match existing.iter().find(|e| e.name == col.name) {
        Some(e) => ColumnDef::new(col.name, e.ty),
        None => col,
      })
      .collect(),
  )
}

fn normalize(set: RowSet, columns: &[ColumnDef]) -> RowSet {
  let (names, rows) = set.into_parts();
  let rows = rows
    .into_iter()
    .map(|row| {
      row
        .into_iter()
        .zip(columns)
        .map(|(value, col)| col.ty.normalize(value))
        .collect()
    })
    .collect();
  RowSet { columns: names, rows }
}

// ─── Watermark ───────────────────────────────────────────────────────────────

/// The largest `modified_field` value stored in `table`, or `None` when the
/// table, the column, or any non-null value is missing. Documents modified
/// after this point are the next batch.
pub fn watermark<D: Destination>(
  dest: &D,
  table: &str,
  modified_field: &str,
) -> Result<Option<Value>> {
  if !dest.table_exists(table).map_err(Error::destination)? {
    return Ok(None);
  }
  let column_name = sanitize_column_name(modified_field);
  let columns = dest.table_columns(table).map_err(Error::destination)?;
  let Some(column) = columns.iter().find(|c| c.name == column_name) else {
    return Ok(None);
  };
  dest.max_value(table, column).map_err(Error::destination)
}
