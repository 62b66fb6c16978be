//! Encoding and decoding between [`Value`] and SQLite storage classes.
//!
//! Booleans are stored as integers `0`/`1`; timestamps as fixed-width
//! RFC 3339 text, which keeps `MAX()` over a timestamp column correct.
//! Decoding is driven by the column's declared type.

use rusqlite::{
  ToSql,
  types::{ToSqlOutput, Value as SqlOwned, ValueRef},
};
use tidemark_core::{
  ColumnType, Value,
  value::{format_timestamp, parse_timestamp},
};

use crate::Error;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

/// Quote and comma-join a column list.
pub fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
  columns
    .iter()
    .map(|c| quote_ident(c.as_ref()))
    .collect::<Vec<_>>()
    .join(", ")
}

/// `?1, ?2, … ?n` starting at `first`.
pub fn placeholders(first: usize, count: usize) -> String {
  (first..first + count)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Borrowing [`ToSql`] adapter for a [`Value`].
pub struct SqlValue<'a>(pub &'a Value);

impl ToSql for SqlValue<'_> {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(match self.0 {
      Value::Null => ToSqlOutput::Owned(SqlOwned::Null),
      Value::Bool(b) => ToSqlOutput::Owned(SqlOwned::Integer(i64::from(*b))),
      Value::Int(i) => ToSqlOutput::Owned(SqlOwned::Integer(*i)),
      Value::Float(f) => ToSqlOutput::Owned(SqlOwned::Real(*f)),
      Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
      Value::Timestamp(ts) => ToSqlOutput::Owned(SqlOwned::Text(format_timestamp(*ts))),
      nested @ (Value::Array(_) | Value::Object(_)) => {
        return Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
          Error::UnsupportedValue(nested.to_string()),
        )));
      }
    })
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode a stored cell as a value of a column declared `ty`.
pub fn decode_value(raw: ValueRef<'_>, ty: ColumnType) -> Value {
  match raw {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) if ty == ColumnType::Boolean => Value::Bool(i != 0),
    ValueRef::Integer(i) => Value::Int(i),
    ValueRef::Real(f) => Value::Float(f),
    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
      let text = String::from_utf8_lossy(bytes).into_owned();
      match ty {
        ColumnType::Timestamp => match parse_timestamp(&text) {
          Some(ts) => Value::Timestamp(ts),
          None => Value::Text(text),
        },
        _ => Value::Text(text),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identifiers_are_quoted() {
    assert_eq!(quote_ident("orders"), "\"orders\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    assert_eq!(column_list(&["a", "b"]), "\"a\", \"b\"");
    assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
  }

  #[test]
  fn integers_decode_through_the_declared_type() {
    assert_eq!(decode_value(ValueRef::Integer(1), ColumnType::Boolean), Value::Bool(true));
    assert_eq!(decode_value(ValueRef::Integer(1), ColumnType::BigInt), Value::Int(1));
    assert_eq!(
      decode_value(ValueRef::Text(b"2024-05-01T00:00:00.000000Z"), ColumnType::Timestamp),
      Value::Timestamp(parse_timestamp("2024-05-01T00:00:00Z").unwrap())
    );
    assert_eq!(
      decode_value(ValueRef::Text(b"not a date"), ColumnType::Timestamp),
      Value::from("not a date")
    );
  }

  #[test]
  fn nested_values_are_rejected() {
    let nested = Value::Array(vec![Value::Int(1)]);
    assert!(SqlValue(&nested).to_sql().is_err());
  }
}
