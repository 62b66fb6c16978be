//! [`RowSet`], a rectangular batch of rows sharing one ordered column list.

use crate::{Document, Error, Result, Value};

/// Ordered column names plus rows of exactly that width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
  pub(crate) columns: Vec<String>,
  pub(crate) rows:    Vec<Vec<Value>>,
}

impl RowSet {
  /// Build a row-set from explicit columns and rows, rejecting rows whose
  /// width differs from the column count.
  pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
    if let Some((row, values)) = rows
      .iter()
      .enumerate()
      .find(|(_, values)| values.len() != columns.len())
    {
      return Err(Error::RaggedRow {
        row,
        expected: columns.len(),
        found: values.len(),
      });
    }
    Ok(Self { columns, rows })
  }

  /// One row per document. Columns are the union of top-level fields in
  /// first-appearance order; fields a document lacks are `Null`.
  pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
    let docs: Vec<Document> = docs.into_iter().collect();

    let mut columns: Vec<String> = vec![];
    for doc in &docs {
      for (name, _) in doc.iter() {
        if !columns.iter().any(|c| c == name) {
          columns.push(name.to_owned());
        }
      }
    }

    let rows = docs
      .into_iter()
      .map(|mut doc| {
        columns
          .iter()
          .map(|c| doc.remove(c).unwrap_or(Value::Null))
          .collect()
      })
      .collect();

    Self { columns, rows }
  }

  pub fn columns(&self) -> &[String] { &self.columns }

  pub fn rows(&self) -> &[Vec<Value>] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == name)
  }

  /// All values of the column at `idx`, in row order.
  pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
    self.rows.iter().map(move |row| &row[idx])
  }

  /// The value at (`row`, `column`), if both exist.
  pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
    let idx = self.column_index(column)?;
    self.rows.get(row).map(|r| &r[idx])
  }

  /// Rename every column through `f`. Two columns mapping to the same name
  /// is an error.
  pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) -> Result<()> {
    let mut renamed: Vec<String> = Vec::with_capacity(self.columns.len());
    for column in &self.columns {
      let name = f(column);
      if renamed.contains(&name) {
        return Err(Error::DuplicateColumn(name));
      }
      renamed.push(name);
    }
    self.columns = renamed;
    Ok(())
  }

  /// Replace every cell through `f`.
  pub fn map_values(&mut self, f: impl Fn(Value) -> Value) {
    for row in &mut self.rows {
      for cell in row.iter_mut() {
        *cell = f(std::mem::replace(cell, Value::Null));
      }
    }
  }

  pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) { (self.columns, self.rows) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn documents_union_columns_in_first_seen_order() {
    let set = RowSet::from_documents([
      Document::new().with("a", 1).with("b", "x"),
      Document::new().with("c", true).with("a", 2),
    ]);
    assert_eq!(set.columns(), ["a", "b", "c"]);
    assert_eq!(set.rows()[1], vec![Value::Int(2), Value::Null, Value::Bool(true)]);
  }

  #[test]
  fn ragged_rows_are_rejected() {
    let err = RowSet::from_rows(vec!["a".into()], vec![vec![Value::Null, Value::Null]])
      .unwrap_err();
    assert!(matches!(err, Error::RaggedRow { row: 0, expected: 1, found: 2 }));
  }

  #[test]
  fn colliding_renames_are_rejected() {
    let mut set = RowSet::from_documents([Document::new().with("a.b", 1).with("a-b", 2)]);
    let err = set.rename_columns(|c| c.replace(['.', '-'], "_")).unwrap_err();
    assert!(matches!(err, Error::DuplicateColumn(name) if name == "a_b"));
  }
}
