//! Flattening engine: nested documents → flat rows.
//!
//! Each pass first expands every mapping-valued column into
//! `<parent>_<child>` sub-columns, then explodes every column holding a
//! non-empty sequence, one column at a time. Sibling sequences therefore
//! produce a full cross product. Passes repeat until nothing changes.

use crate::{Document, Error, Result, RowSet, Value};

/// Flatten `set` until no cell holds a mapping or a non-empty sequence.
///
/// Rows whose cell is an empty sequence in an exploded column are dropped.
/// Empty sequences in columns that are never exploded are left in place.
pub fn flatten(mut set: RowSet) -> Result<RowSet> {
  loop {
    let mut changed = false;

    for name in columns_where(&set, |v| matches!(v, Value::Object(_))) {
      expand_object_column(&mut set, &name)?;
      changed = true;
    }

    let sequences = columns_where(&set, Value::is_non_empty_array);
    if !sequences.is_empty() {
      for name in &sequences {
        wrap_scalars(&mut set, name);
      }
      for name in &sequences {
        explode(&mut set, name);
      }
      changed = true;
    }

    if !changed {
      return Ok(set);
    }
  }
}

/// Names of columns where at least one row satisfies `pred`.
fn columns_where(set: &RowSet, pred: impl Fn(&Value) -> bool) -> Vec<String> {
  set
    .columns
    .iter()
    .enumerate()
    .filter(|(idx, _)| set.column_values(*idx).any(&pred))
    .map(|(_, name)| name.clone())
    .collect()
}

/// Replace column `name` with one sub-column per child field seen in any
/// row, appended at the end. Non-mapping cells count as empty mappings.
fn expand_object_column(set: &mut RowSet, name: &str) -> Result<()> {
  let Some(idx) = set.column_index(name) else {
    return Ok(());
  };

  let mut children: Vec<String> = vec![];
  for value in set.column_values(idx) {
    if let Value::Object(doc) = value {
      for (child, _) in doc.iter() {
        if !children.iter().any(|c| c == child) {
          children.push(child.to_owned());
        }
      }
    }
  }

  let sub_columns: Vec<String> =
    children.iter().map(|child| format!("{name}_{child}")).collect();
  for sub in &sub_columns {
    let clash = set
      .columns
      .iter()
      .enumerate()
      .any(|(i, existing)| i != idx && existing == sub);
    if clash {
      return Err(Error::DuplicateColumn(sub.clone()));
    }
  }

  set.columns.remove(idx);
  set.columns.extend(sub_columns);

  for row in &mut set.rows {
    let mut doc = match row.remove(idx) {
      Value::Object(doc) => doc,
      _ => Document::new(),
    };
    row.extend(
      children
        .iter()
        .map(|child| doc.remove(child).unwrap_or(Value::Null)),
    );
  }

  Ok(())
}

/// Wrap every non-sequence cell of `name` into a one-element sequence.
fn wrap_scalars(set: &mut RowSet, name: &str) {
  let Some(idx) = set.column_index(name) else {
    return;
  };
  for row in &mut set.rows {
    if !matches!(row[idx], Value::Array(_)) {
      let scalar = std::mem::replace(&mut row[idx], Value::Null);
      row[idx] = Value::Array(vec![scalar]);
    }
  }
}

/// Replicate each row once per element of its sequence in column `name`.
fn explode(set: &mut RowSet, name: &str) {
  let Some(idx) = set.column_index(name) else {
    return;
  };

  let rows = std::mem::take(&mut set.rows);
  for mut row in rows {
    match std::mem::replace(&mut row[idx], Value::Null) {
      Value::Array(items) => {
        for item in items {
          let mut replica = row.clone();
          replica[idx] = item;
          set.rows.push(replica);
        }
      }
      scalar => {
        row[idx] = scalar;
        set.rows.push(row);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rows_of(set: &RowSet, columns: &[&str]) -> Vec<Vec<Value>> {
    set
      .rows()
      .iter()
      .enumerate()
      .map(|(i, _)| {
        columns
          .iter()
          .map(|c| set.get(i, c).cloned().unwrap_or(Value::Null))
          .collect()
      })
      .collect()
  }

  #[test]
  fn flat_input_is_unchanged() {
    let set = RowSet::from_documents([
      Document::new().with("_id", "k1").with("a", 1).with("b", "x"),
      Document::new().with("_id", "k2").with("a", 2).with("b", Value::Null),
    ]);
    assert_eq!(flatten(set.clone()).unwrap(), set);
  }

  #[test]
  fn nested_mappings_become_underscored_columns() {
    let address = Document::new()
      .with("city", "Oslo")
      .with("geo", Document::new().with("lat", 59.9).with("lon", 10.7));
    let set = RowSet::from_documents([
      Document::new().with("_id", "k1").with("address", address),
      Document::new().with("_id", "k2").with("address", "unknown"),
    ]);

    let flat = flatten(set).unwrap();
    assert_eq!(
      flat.columns(),
      ["_id", "address_city", "address_geo_lat", "address_geo_lon"]
    );
    assert_eq!(flat.get(0, "address_geo_lat"), Some(&Value::Float(59.9)));
    assert_eq!(flat.get(1, "address_city"), Some(&Value::Null));
  }

  #[test]
  fn sibling_arrays_expand_to_cross_product() {
    let set = RowSet::from_documents([Document::new()
      .with("_id", "k1")
      .with("xs", vec![1, 2, 3])
      .with("ys", vec!["a", "b"])]);

    let flat = flatten(set).unwrap();
    assert_eq!(flat.len(), 6);

    let pairs: Vec<(Value, Value)> = rows_of(&flat, &["xs", "ys"])
      .into_iter()
      .map(|r| (r[0].clone(), r[1].clone()))
      .collect();
    for x in [1, 2, 3] {
      for y in ["a", "b"] {
        assert!(pairs.contains(&(Value::from(x), Value::from(y))));
      }
    }
  }

  #[test]
  fn scalars_in_array_columns_are_kept_as_single_rows() {
    let set = RowSet::from_documents([
      Document::new().with("_id", "k1").with("tags", vec!["a", "b"]),
      Document::new().with("_id", "k2").with("tags", "solo"),
      Document::new().with("_id", "k3"),
    ]);

    let flat = flatten(set).unwrap();
    assert_eq!(
      rows_of(&flat, &["_id", "tags"]),
      vec![
        vec![Value::from("k1"), Value::from("a")],
        vec![Value::from("k1"), Value::from("b")],
        vec![Value::from("k2"), Value::from("solo")],
        vec![Value::from("k3"), Value::Null],
      ]
    );
  }

  #[test]
  fn empty_sequences_drop_rows_in_exploded_columns() {
    let set = RowSet::from_documents([
      Document::new().with("_id", "k1").with("tags", vec!["a"]),
      Document::new().with("_id", "k2").with("tags", Vec::<Value>::new()),
    ]);

    let flat = flatten(set).unwrap();
    assert_eq!(flat.len(), 1);
    assert_eq!(flat.get(0, "_id"), Some(&Value::from("k1")));
  }

  #[test]
  fn empty_sequences_survive_when_no_row_has_elements() {
    let set = RowSet::from_documents([Document::new()
      .with("_id", "k1")
      .with("tags", Vec::<Value>::new())]);

    let flat = flatten(set).unwrap();
    assert_eq!(flat.get(0, "tags"), Some(&Value::Array(vec![])));
  }

  #[test]
  fn arrays_of_mappings_flatten_over_several_passes() {
    let line = |sku: &str, qty: i64| Document::new().with("sku", sku).with("qty", qty);
    let set = RowSet::from_documents([Document::new()
      .with("_id", "order-1")
      .with("items", vec![line("A", 1), line("B", 2)])]);

    let flat = flatten(set).unwrap();
    assert_eq!(flat.columns(), ["_id", "items_sku", "items_qty"]);
    assert_eq!(
      rows_of(&flat, &["items_sku", "items_qty"]),
      vec![
        vec![Value::from("A"), Value::Int(1)],
        vec![Value::from("B"), Value::Int(2)],
      ]
    );
  }

  #[test]
  fn generated_name_clashing_with_existing_column_fails() {
    let set = RowSet::from_documents([Document::new()
      .with("a_b", 1)
      .with("a", Document::new().with("b", 2))]);

    let err = flatten(set).unwrap_err();
    assert!(matches!(err, Error::DuplicateColumn(name) if name == "a_b"));
  }
}
