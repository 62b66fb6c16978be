//! Values and documents: the source-side data model.
//!
//! A [`Document`] is an insertion-ordered mapping from field name to
//! [`Value`]. Values cover a fixed set of kinds; nested mappings and
//! sequences only exist until the flattening engine has run.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single field value from a source document or a flattened row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
  Timestamp(DateTime<Utc>),
  Array(Vec<Value>),
  Object(Document),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  /// Returns `true` for sequences holding at least one element.
  pub fn is_non_empty_array(&self) -> bool {
    matches!(self, Self::Array(items) if !items.is_empty())
  }

  /// Canonical text for a value, shared by fingerprints, key grouping and
  /// text-typed columns. Returns `None` for `Null`.
  ///
  /// Integral floats render like integers so that `2.0` and `2` agree
  /// after a round trip through a numeric column.
  pub fn canonical(&self) -> Option<String> {
    match self {
      Self::Null => None,
      Self::Bool(b) => Some(b.to_string()),
      Self::Int(i) => Some(i.to_string()),
      Self::Float(f) => Some(canonical_float(*f)),
      Self::Text(s) => Some(s.clone()),
      Self::Timestamp(ts) => Some(format_timestamp(*ts)),
      Self::Array(_) | Self::Object(_) => Some(self.to_string()),
    }
  }
}

fn canonical_float(f: f64) -> String {
  match integral_float(f) {
    Some(i) => i.to_string(),
    None => f.to_string(),
  }
}

/// Returns the integer value of `f` if it is finite, integral and within
/// `i64` range.
pub(crate) fn integral_float(f: f64) -> Option<i64> {
  const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
  if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
    Some(f as i64)
  } else {
    None
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("null"),
      Self::Array(items) => {
        f.write_str("[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{item}")?;
        }
        f.write_str("]")
      }
      Self::Object(doc) => {
        f.write_str("{")?;
        for (i, (name, value)) in doc.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
      }
      scalar => f.write_str(&scalar.canonical().unwrap_or_default()),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Int(i) }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self { Self::Int(i64::from(i)) }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<DateTime<Utc>> for Value {
  fn from(ts: DateTime<Utc>) -> Self { Self::Timestamp(ts) }
}

impl From<Document> for Value {
  fn from(doc: Document) -> Self { Self::Object(doc) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Self::Array(items.into_iter().map(Into::into).collect())
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 (microseconds, `Z` suffix). Lexicographic order of
/// the output matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse any RFC 3339 string into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

// ─── Document ────────────────────────────────────────────────────────────────

/// An insertion-ordered field mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
  fields: Vec<(String, Value)>,
}

impl Document {
  pub fn new() -> Self { Self::default() }

  /// Set `name` to `value`. An existing field keeps its position.
  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    let name = name.into();
    let value = value.into();
    match self.fields.iter_mut().find(|(n, _)| *n == name) {
      Some((_, slot)) => *slot = value,
      None => self.fields.push((name, value)),
    }
  }

  /// Builder-style [`insert`](Self::insert).
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(name, value);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }

  /// Remove and return the value of `name`, if present.
  pub fn remove(&mut self, name: &str) -> Option<Value> {
    let pos = self.fields.iter().position(|(n, _)| n == name)?;
    Some(self.fields.remove(pos).1)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.fields.iter().map(|(n, v)| (n.as_str(), v))
  }

  pub fn len(&self) -> usize { self.fields.len() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut doc = Document::new();
    for (name, value) in iter {
      doc.insert(name, value);
    }
    doc
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn insert_replaces_in_place() {
    let mut doc = Document::new().with("a", 1).with("b", 2);
    doc.insert("a", 3);
    let names: Vec<_> = doc.iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(doc.get("a"), Some(&Value::Int(3)));
  }

  #[test]
  fn integral_floats_render_as_integers() {
    assert_eq!(Value::Float(2.0).canonical().as_deref(), Some("2"));
    assert_eq!(Value::Float(1.5).canonical().as_deref(), Some("1.5"));
    assert_eq!(Value::Float(f64::NAN).canonical().as_deref(), Some("NaN"));
    assert_eq!(Value::Null.canonical(), None);
  }

  #[test]
  fn timestamps_are_fixed_width() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(500_000);
    assert_eq!(format_timestamp(a), "2024-01-01T00:00:00.000000Z");
    assert!(format_timestamp(a) < format_timestamp(b));
    assert_eq!(parse_timestamp(&format_timestamp(b)), Some(b));
  }
}
