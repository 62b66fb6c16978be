//! Schema evolution: make a destination table able to hold a row-set.
//!
//! Columns are only ever added. Existing columns keep their type even when
//! a later batch would infer a different one.

use tracing::{info, warn};

use crate::{ColumnDef, DELETED_COLUMN, Destination, Error, Result};

/// A unique index on the natural key left behind by older versions of the
/// table layout. Its uniqueness breaks multi-row keys, so it is dropped
/// whenever it is found.
pub const LEGACY_UNIQUE_INDEX: &str = "unique_id";

/// What [`ensure_schema`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChange {
  pub created:              bool,
  pub columns_added:        Vec<String>,
  pub legacy_index_dropped: bool,
}

/// Guarantee that `table` exists with at least `columns`.
///
/// A missing table is created (with a key index when `key_column` is
/// given). An existing table gains any absent column with its inferred
/// type, and the soft-delete flag if it lacks one.
pub fn ensure_schema<D: Destination>(
  dest: &D,
  table: &str,
  columns: &[ColumnDef],
  key_column: Option<&str>,
) -> Result<SchemaChange> {
  let mut change = SchemaChange::default();

  if !dest.table_exists(table).map_err(Error::destination)? {
    dest
      .create_table(table, columns, key_column)
      .map_err(Error::destination)?;
    info!(table, columns = columns.len(), "table created");
    change.created = true;
    return Ok(change);
  }

  let existing = dest.table_columns(table).map_err(Error::destination)?;
  let has = |name: &str| existing.iter().any(|c| c.name == name);

  for column in columns.iter().filter(|c| !has(&c.name)) {
    dest.add_column(table, column).map_err(Error::destination)?;
    info!(table, column = %column.name, ty = %column.ty, "column added");
    change.columns_added.push(column.name.clone());
  }

  if !has(DELETED_COLUMN) {
    dest.add_deleted_flag(table).map_err(Error::destination)?;
    info!(table, column = DELETED_COLUMN, "column added");
    change.columns_added.push(DELETED_COLUMN.to_owned());
  }

  change.legacy_index_dropped = drop_legacy_index(dest, table);

  Ok(change)
}

/// Drop [`LEGACY_UNIQUE_INDEX`] if present. Failures are logged and ignored.
fn drop_legacy_index<D: Destination>(dest: &D, table: &str) -> bool {
  let outcome = dest
    .index_exists(table, LEGACY_UNIQUE_INDEX)
    .and_then(|present| {
      if present {
        dest.drop_index(table, LEGACY_UNIQUE_INDEX)?;
      }
      Ok(present)
    });

  match outcome {
    Ok(dropped) => {
      if dropped {
        info!(table, index = LEGACY_UNIQUE_INDEX, "dropped stale index");
      }
      dropped
    }
    Err(e) => {
      warn!(table, index = LEGACY_UNIQUE_INDEX, error = %e, "could not inspect stale index");
      false
    }
  }
}
