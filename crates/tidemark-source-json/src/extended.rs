//! Decoding JSON into [`Document`]s, including the Extended-JSON scalar
//! wrappers produced by document-store exports (`{"$oid": …}`,
//! `{"$date": …}`, `{"$numberLong": …}` and friends).

use chrono::DateTime;
use serde_json::{Map, Value as Json};
use tidemark_core::{Document, Value, value::parse_timestamp};

use crate::{Error, Result};

/// Decode one collection entry. Anything but a JSON object is rejected.
pub fn decode_document(json: Json) -> Result<Document> {
  match json {
    Json::Object(map) => decode_object(map),
    other => Err(Error::NotADocument(kind(&other))),
  }
}

pub fn decode_value(json: Json) -> Result<Value> {
  Ok(match json {
    Json::Null => Value::Null,
    Json::Bool(b) => Value::Bool(b),
    Json::Number(n) => number(&n),
    Json::String(s) => Value::Text(s),
    Json::Array(items) => Value::Array(
      items
        .into_iter()
        .map(decode_value)
        .collect::<Result<_>>()?,
    ),
    Json::Object(map) => match single_wrapper(&map) {
      Some((wrapper, inner)) => decode_wrapper(wrapper, inner)?,
      None => Value::Object(decode_object(map)?),
    },
  })
}

fn decode_object(map: Map<String, Json>) -> Result<Document> {
  map
    .into_iter()
    .map(|(name, value)| Ok((name, decode_value(value)?)))
    .collect()
}

/// Integers outside `i64` fall back to floats.
fn number(n: &serde_json::Number) -> Value {
  match n.as_i64() {
    Some(i) => Value::Int(i),
    None => n.as_f64().map_or(Value::Null, Value::Float),
  }
}

fn kind(json: &Json) -> &'static str {
  match json {
    Json::Null => "null",
    Json::Bool(_) => "a boolean",
    Json::Number(_) => "a number",
    Json::String(_) => "a string",
    Json::Array(_) => "an array",
    Json::Object(_) => "an object",
  }
}

// ─── Wrappers ────────────────────────────────────────────────────────────────

const WRAPPERS: &[&str] = &[
  "$oid",
  "$date",
  "$numberLong",
  "$numberInt",
  "$numberDouble",
  "$numberDecimal",
];

/// The wrapper name and payload when `map` is exactly one known wrapper.
fn single_wrapper(map: &Map<String, Json>) -> Option<(&'static str, &Json)> {
  if map.len() != 1 {
    return None;
  }
  let (key, inner) = map.iter().next()?;
  WRAPPERS
    .iter()
    .find(|w| **w == key.as_str())
    .map(|w| (*w, inner))
}

fn decode_wrapper(wrapper: &'static str, inner: &Json) -> Result<Value> {
  match wrapper {
    "$oid" => Ok(Value::Text(text_of(inner))),
    "$date" => decode_date(inner),
    "$numberLong" | "$numberInt" => integer(wrapper, inner).map(Value::Int),
    _ => float(wrapper, inner).map(Value::Float),
  }
}

fn decode_date(inner: &Json) -> Result<Value> {
  let invalid = || Error::InvalidDate(inner.to_string());
  let millis = match inner {
    Json::String(s) => return parse_timestamp(s).map(Value::Timestamp).ok_or_else(invalid),
    Json::Number(n) => n.as_i64().ok_or_else(invalid)?,
    Json::Object(map) => match single_wrapper(map) {
      Some(("$numberLong", long)) => integer("$numberLong", long)?,
      _ => return Err(invalid()),
    },
    _ => return Err(invalid()),
  };
  DateTime::from_timestamp_millis(millis)
    .map(Value::Timestamp)
    .ok_or_else(invalid)
}

fn integer(wrapper: &'static str, inner: &Json) -> Result<i64> {
  let parsed = match inner {
    Json::Number(n) => n.as_i64(),
    Json::String(s) => s.trim().parse().ok(),
    _ => None,
  };
  parsed.ok_or_else(|| Error::InvalidNumber { wrapper, value: text_of(inner) })
}

fn float(wrapper: &'static str, inner: &Json) -> Result<f64> {
  let parsed = match inner {
    Json::Number(n) => n.as_f64(),
    Json::String(s) => s.trim().parse().ok(),
    _ => None,
  };
  parsed.ok_or_else(|| Error::InvalidNumber { wrapper, value: text_of(inner) })
}

fn text_of(json: &Json) -> String {
  match json {
    Json::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  use super::*;

  #[test]
  fn plain_json_maps_onto_values() {
    let doc = decode_document(json!({
      "name": "Ada",
      "age": 36,
      "ratio": 0.5,
      "active": true,
      "tags": ["a", "b"],
      "address": { "city": "London" },
      "nothing": null
    }))
    .unwrap();

    let names: Vec<_> = doc.iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["name", "age", "ratio", "active", "tags", "address", "nothing"]);
    assert_eq!(doc.get("age"), Some(&Value::Int(36)));
    assert_eq!(doc.get("ratio"), Some(&Value::Float(0.5)));
    assert_eq!(doc.get("tags"), Some(&Value::from(vec!["a", "b"])));
    assert_eq!(
      doc.get("address"),
      Some(&Value::Object(Document::new().with("city", "London")))
    );
  }

  #[test]
  fn wrappers_unwrap_to_scalars() {
    let doc = decode_document(json!({
      "_id": { "$oid": "65f0c0ffee" },
      "seen": { "$date": "2024-05-01T10:00:00+02:00" },
      "born": { "$date": { "$numberLong": "0" } },
      "big": { "$numberLong": "9007199254740993" },
      "small": { "$numberInt": "7" },
      "price": { "$numberDecimal": "19.99" }
    }))
    .unwrap();

    assert_eq!(doc.get("_id"), Some(&Value::from("65f0c0ffee")));
    assert_eq!(
      doc.get("seen"),
      Some(&Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()))
    );
    assert_eq!(
      doc.get("born"),
      Some(&Value::Timestamp(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()))
    );
    assert_eq!(doc.get("big"), Some(&Value::Int(9_007_199_254_740_993)));
    assert_eq!(doc.get("small"), Some(&Value::Int(7)));
    assert_eq!(doc.get("price"), Some(&Value::Float(19.99)));
  }

  #[test]
  fn objects_with_extra_keys_are_not_wrappers() {
    let value = decode_value(json!({ "$oid": "x", "other": 1 })).unwrap();
    assert!(matches!(value, Value::Object(doc) if doc.len() == 2));
  }

  #[test]
  fn huge_integers_become_floats() {
    assert_eq!(decode_value(json!(u64::MAX)).unwrap(), Value::Float(u64::MAX as f64));
  }

  #[test]
  fn malformed_wrappers_are_errors() {
    assert!(matches!(
      decode_value(json!({ "$date": "yesterday" })),
      Err(Error::InvalidDate(_))
    ));
    assert!(matches!(
      decode_value(json!({ "$numberLong": "twelve" })),
      Err(Error::InvalidNumber { wrapper: "$numberLong", .. })
    ));
    assert!(matches!(decode_document(json!([1, 2])), Err(Error::NotADocument("an array"))));
  }
}
