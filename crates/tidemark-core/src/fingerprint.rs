//! Content fingerprints for flattened rows.
//!
//! A fingerprint is a SHA-256 digest over the canonical text of the data
//! columns, in a fixed column order. Bookkeeping columns (surrogate id,
//! soft-delete flag, last-modified field) are never part of it.

use sha2::{Digest, Sha256};

use crate::{DELETED_COLUMN, ID_COLUMN, Value};

/// The columns of `columns` that contribute to a fingerprint, in order.
pub fn fingerprint_columns<'a>(columns: &'a [String], modified_field: &str) -> Vec<&'a str> {
  columns
    .iter()
    .map(String::as_str)
    .filter(|c| *c != ID_COLUMN && *c != DELETED_COLUMN && *c != modified_field)
    .collect()
}

/// Digest the given cell values.
///
/// Each cell is framed (null marker, or length-prefixed canonical text) so
/// that no choice of cell contents can collide by concatenation.
pub fn fingerprint<'a>(values: impl IntoIterator<Item = &'a Value>) -> String {
  let mut hasher = Sha256::new();
  for value in values {
    match value.canonical() {
      None => hasher.update([0u8]),
      Some(text) => {
        hasher.update([1u8]);
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
      }
    }
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equal_values_give_equal_fingerprints() {
    let a = [Value::from("k1"), Value::Int(1), Value::from("x")];
    let b = [Value::from("k1"), Value::Float(1.0), Value::from("x")];
    assert_eq!(fingerprint(&a), fingerprint(&b));
  }

  #[test]
  fn framing_prevents_concatenation_collisions() {
    let a = [Value::from("ab"), Value::from("c")];
    let b = [Value::from("a"), Value::from("bc")];
    assert_ne!(fingerprint(&a), fingerprint(&b));

    let null = [Value::Null];
    let empty = [Value::from("")];
    assert_ne!(fingerprint(&null), fingerprint(&empty));
  }

  #[test]
  fn bookkeeping_columns_are_excluded() {
    let columns: Vec<String> = ["id", "_id", "a", "is_deleted", "updated_at"]
      .into_iter()
      .map(String::from)
      .collect();
    assert_eq!(fingerprint_columns(&columns, "updated_at"), ["_id", "a"]);
  }
}
