//! Deletion sweep: soft-delete keys that vanished from the source.
//!
//! The sweep compares *cardinalities* first and does nothing when the
//! source and the destination hold the same number of distinct keys, even
//! if the key sets differ. A removal balanced by an addition elsewhere in
//! the collection therefore goes unnoticed until the counts diverge.
// TODO: compare key sets directly once product review approves dropping the
// count shortcut.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::{ColumnType, Destination, Error, Result, Value, load::sanitize_column_name};

/// The result of a [`sweep_deleted`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
  /// The table or its key column does not exist.
  Skipped,
  /// Distinct key counts agree; nothing was checked further.
  Balanced { count: usize },
  /// Counts differ but every active destination key is still in the source.
  NoMissingKeys { source: usize, destination: usize },
  /// These keys were soft-deleted, flagging `rows` rows.
  SoftDeleted { keys: Vec<String>, rows: usize },
}

/// Soft-delete every active key of `table` that is absent from
/// `source_keys`, unless the distinct key counts are equal.
///
/// `source_keys` is the full key set of the source collection, as canonical
/// text. Each is read as the key column would store it before comparing.
pub fn sweep_deleted<D: Destination>(
  dest: &D,
  table: &str,
  key_field: &str,
  source_keys: &[String],
) -> Result<SweepOutcome> {
  let key_column = sanitize_column_name(key_field);
  let key_column = key_column.as_str();

  if !dest.table_exists(table).map_err(Error::destination)? {
    return Ok(SweepOutcome::Skipped);
  }
  let columns = dest.table_columns(table).map_err(Error::destination)?;
  let Some(key_def) = columns.iter().find(|c| c.name == key_column) else {
    return Ok(SweepOutcome::Skipped);
  };

  let source_keys = stored_keys(source_keys, key_def.ty);
  let source: BTreeSet<&str> = source_keys.iter().map(String::as_str).collect();
  let active_keys = dest
    .active_keys(table, key_column)
    .map_err(Error::destination)?;
  let active: BTreeSet<&str> = active_keys.iter().map(String::as_str).collect();

  info!(table, source = source.len(), destination = active.len(), "key counts");

  if source.len() == active.len() {
    return Ok(SweepOutcome::Balanced { count: source.len() });
  }

  let missing: Vec<String> = active
    .difference(&source)
    .map(|k| (*k).to_owned())
    .collect();

  if missing.is_empty() {
    warn!(table, "key count mismatch but no missing keys found");
    return Ok(SweepOutcome::NoMissingKeys {
      source:      source.len(),
      destination: active.len(),
    });
  }

  let rows = dest
    .soft_delete_keys(table, key_column, &missing)
    .map_err(Error::destination)?;
  info!(table, keys = missing.len(), rows, "marked deleted");

  Ok(SweepOutcome::SoftDeleted { keys: missing, rows })
}

/// Source keys in the form the destination holds them, so `"007"` in a
/// `BIGINT` key column reads as `7`.
fn stored_keys(source_keys: &[String], ty: ColumnType) -> Vec<String> {
  source_keys
    .iter()
    .filter_map(|k| ty.normalize(Value::Text(k.clone())).canonical())
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::value::format_timestamp;

  fn keys(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

  #[test]
  fn numeric_keys_lose_leading_zeros() {
    assert_eq!(stored_keys(&keys(&["1", "007"]), ColumnType::BigInt), ["1", "7"]);
    assert_eq!(stored_keys(&keys(&["007"]), ColumnType::Varchar(53)), ["007"]);
  }

  #[test]
  fn timestamp_keys_are_read_in_utc() {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    assert_eq!(
      stored_keys(&keys(&["2024-05-01T10:00:00+02:00"]), ColumnType::Timestamp),
      [format_timestamp(ts)]
    );
  }
}
