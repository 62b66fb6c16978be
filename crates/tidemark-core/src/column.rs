//! Destination column types: inference from samples, SQL rendering, and
//! value normalisation.

use std::fmt;

use crate::{Value, value::integral_float, value::parse_timestamp};

/// Longest string that still gets a bounded `VARCHAR`.
pub const VARCHAR_MAX: usize = 255;

/// Extra room added to the longest observed string.
pub const VARCHAR_HEADROOM: usize = 50;

// ─── Column type ─────────────────────────────────────────────────────────────

/// Storage type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Boolean,
  BigInt,
  /// Scaled decimal with six fractional digits.
  Decimal,
  Timestamp,
  Varchar(usize),
  Text,
}

impl ColumnType {
  /// Declared SQL type used in DDL.
  pub fn sql(&self) -> String {
    match self {
      Self::Boolean => "BOOLEAN".to_owned(),
      Self::BigInt => "BIGINT".to_owned(),
      Self::Decimal => "DECIMAL(20,6)".to_owned(),
      Self::Timestamp => "DATETIME".to_owned(),
      Self::Varchar(n) => format!("VARCHAR({n})"),
      Self::Text => "TEXT".to_owned(),
    }
  }

  /// Parse an introspected declared type. Anything unrecognised reads as
  /// [`ColumnType::Text`].
  pub fn from_sql(declared: &str) -> Self {
    let upper = declared.trim().to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or_default().trim();
    match base {
      "BOOLEAN" | "BOOL" => Self::Boolean,
      "TINYINT" if upper == "TINYINT(1)" => Self::Boolean,
      "BIGINT" | "INT" | "INTEGER" | "SMALLINT" | "TINYINT" => Self::BigInt,
      "DECIMAL" | "NUMERIC" | "REAL" | "DOUBLE" | "FLOAT" => Self::Decimal,
      "DATETIME" | "TIMESTAMP" => Self::Timestamp,
      "VARCHAR" => upper
        .trim_start_matches("VARCHAR")
        .trim_matches(|c| c == '(' || c == ')' || c == ' ')
        .parse()
        .map(Self::Varchar)
        .unwrap_or(Self::Text),
      _ => Self::Text,
    }
  }

  fn is_textual(&self) -> bool { matches!(self, Self::Varchar(_) | Self::Text) }

  /// Coerce `value` into the shape it has after being written to and read
  /// back from a column of this type, so that fingerprints of incoming and
  /// stored rows agree.
  pub fn normalize(&self, value: Value) -> Value {
    match (self, value) {
      (_, Value::Null) => Value::Null,

      (Self::Boolean, Value::Int(i)) => Value::Bool(i != 0),
      (Self::Boolean, Value::Float(f)) => match integral_float(f) {
        Some(i) => Value::Bool(i != 0),
        None => Value::Float(f),
      },
      (Self::Boolean, Value::Text(s)) => match numeric_text(&s) {
        Some(Value::Int(i)) => Value::Bool(i != 0),
        Some(other) => other,
        None => Value::Text(s),
      },

      (Self::BigInt | Self::Decimal, Value::Bool(b)) => Value::Int(i64::from(b)),
      (Self::BigInt | Self::Decimal, Value::Float(f)) => match integral_float(f) {
        Some(i) => Value::Int(i),
        None => Value::Float(f),
      },
      (Self::BigInt | Self::Decimal, Value::Text(s)) => numeric_text(&s).unwrap_or(Value::Text(s)),

      (Self::Timestamp, Value::Bool(b)) => Value::Int(i64::from(b)),
      (Self::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
        Some(ts) => Value::Timestamp(ts),
        None => numeric_text(&s).unwrap_or(Value::Text(s)),
      },

      (ty, value) if ty.is_textual() => match value.canonical() {
        Some(text) => Value::Text(text),
        None => Value::Null,
      },

      (_, value) => value,
    }
  }
}

fn numeric_text(s: &str) -> Option<Value> {
  let trimmed = s.trim();
  if let Ok(i) = trimmed.parse::<i64>() {
    return Some(Value::Int(i));
  }
  let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
  Some(match integral_float(f) {
    Some(i) => Value::Int(i),
    None => Value::Float(f),
  })
}

impl fmt::Display for ColumnType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.sql()) }
}

/// A named, typed destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
  pub name: String,
  pub ty:   ColumnType,
}

impl ColumnDef {
  pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
    Self { name: name.into(), ty }
  }
}

// ─── Inference ───────────────────────────────────────────────────────────────

/// Infer a storage type from a column's sample values.
///
/// The kind of the first non-null sample decides the type. Floats become
/// `BigInt` only if every sample is an integral float; strings are sized
/// from the longest sample. An all-null column is `Text`.
pub fn infer_column_type<'a>(samples: impl IntoIterator<Item = &'a Value>) -> ColumnType {
  let samples: Vec<&Value> = samples.into_iter().filter(|v| !v.is_null()).collect();

  let Some(first) = samples.first() else {
    return ColumnType::Text;
  };

  match first {
    Value::Bool(_) => ColumnType::Boolean,
    Value::Int(_) => ColumnType::BigInt,
    Value::Float(_) => {
      let all_integral = samples
        .iter()
        .all(|v| matches!(v, Value::Float(f) if f.is_finite() && f.fract() == 0.0));
      if all_integral {
        ColumnType::BigInt
      } else {
        ColumnType::Decimal
      }
    }
    Value::Timestamp(_) => ColumnType::Timestamp,
    Value::Text(_) => {
      let longest = samples
        .iter()
        .filter_map(|v| v.canonical())
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0);
      if longest <= VARCHAR_MAX {
        ColumnType::Varchar((longest + VARCHAR_HEADROOM).min(VARCHAR_MAX))
      } else {
        ColumnType::Text
      }
    }
    Value::Null | Value::Array(_) | Value::Object(_) => ColumnType::Text,
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  fn infer(values: &[Value]) -> ColumnType { infer_column_type(values) }

  #[test]
  fn first_non_null_sample_decides() {
    assert_eq!(infer(&[Value::Null, Value::Bool(true)]), ColumnType::Boolean);
    assert_eq!(infer(&[Value::Int(1), Value::from("x")]), ColumnType::BigInt);
    assert_eq!(
      infer(&[Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())]),
      ColumnType::Timestamp
    );
  }

  #[test]
  fn floats_split_on_integrality() {
    assert_eq!(infer(&[Value::Float(1.0), Value::Float(7.0)]), ColumnType::BigInt);
    assert_eq!(infer(&[Value::Float(1.0), Value::Float(1.25)]), ColumnType::Decimal);
    assert_eq!(infer(&[Value::Float(1.0), Value::Int(2)]), ColumnType::Decimal);
  }

  #[test]
  fn strings_are_sized_with_headroom() {
    assert_eq!(infer(&[Value::from("abc")]), ColumnType::Varchar(53));
    assert_eq!(infer(&[Value::from("x".repeat(240))]), ColumnType::Varchar(255));
    assert_eq!(infer(&[Value::from("x".repeat(256))]), ColumnType::Text);
  }

  #[test]
  fn empty_or_null_columns_are_text() {
    assert_eq!(infer(&[]), ColumnType::Text);
    assert_eq!(infer(&[Value::Null, Value::Null]), ColumnType::Text);
  }

  #[test]
  fn declared_types_round_trip() {
    for ty in [
      ColumnType::Boolean,
      ColumnType::BigInt,
      ColumnType::Decimal,
      ColumnType::Timestamp,
      ColumnType::Varchar(80),
      ColumnType::Text,
    ] {
      assert_eq!(ColumnType::from_sql(&ty.sql()), ty);
    }
    assert_eq!(ColumnType::from_sql("tinyint(1)"), ColumnType::Boolean);
    assert_eq!(ColumnType::from_sql("BLOB"), ColumnType::Text);
  }

  #[test]
  fn normalization_matches_stored_shape() {
    assert_eq!(ColumnType::Boolean.normalize(Value::Int(1)), Value::Bool(true));
    assert_eq!(ColumnType::BigInt.normalize(Value::Float(3.0)), Value::Int(3));
    assert_eq!(ColumnType::Decimal.normalize(Value::Float(3.5)), Value::Float(3.5));
    assert_eq!(ColumnType::Varchar(60).normalize(Value::Int(5)), Value::from("5"));
    assert_eq!(ColumnType::Text.normalize(Value::Bool(false)), Value::from("false"));
    assert_eq!(
      ColumnType::Timestamp.normalize(Value::from("2024-05-01T10:00:00+02:00")),
      Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
    );
  }

  #[test]
  fn integral_floats_and_bools_take_their_stored_shape() {
    assert_eq!(ColumnType::Boolean.normalize(Value::Float(1.0)), Value::Bool(true));
    assert_eq!(ColumnType::Boolean.normalize(Value::Float(0.0)), Value::Bool(false));
    assert_eq!(ColumnType::Boolean.normalize(Value::Float(0.5)), Value::Float(0.5));
    assert_eq!(ColumnType::Timestamp.normalize(Value::Bool(true)), Value::Int(1));
  }
}
