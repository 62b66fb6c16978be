//! [`JsonDirSource`], a directory of JSON exports as a [`DocumentSource`].

use std::{
  cmp::Ordering,
  fs,
  io::{BufRead as _, BufReader},
  path::{Path, PathBuf},
};

use tidemark_core::{Document, DocumentSource, Value, value::parse_timestamp};
use tracing::debug;

use crate::{
  Error, Result,
  extended::decode_document,
};

// ─── Layout ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
  /// `<collection>.json`: one array of documents.
  Array,
  /// `<collection>.jsonl`: one document per line.
  Lines,
}

impl Layout {
  fn from_extension(ext: &str) -> Option<Self> {
    match ext {
      "json" => Some(Self::Array),
      "jsonl" => Some(Self::Lines),
      _ => None,
    }
  }

  fn extension(self) -> &'static str {
    match self {
      Self::Array => "json",
      Self::Lines => "jsonl",
    }
  }
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// Every `<name>.json` or `<name>.jsonl` file under `root` is the
/// collection `<name>`. Files are re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
  root: PathBuf,
}

impl JsonDirSource {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Every document of `collection`, in file order.
  pub fn documents(&self, collection: &str) -> Result<Vec<Document>> {
    let (path, layout) = self.locate(collection)?;
    let docs = match layout {
      Layout::Array => read_array(&path)?,
      Layout::Lines => read_lines(&path)?,
    };
    debug!(collection, path = %path.display(), documents = docs.len(), "collection read");
    Ok(docs)
  }

  fn locate(&self, collection: &str) -> Result<(PathBuf, Layout)> {
    [Layout::Array, Layout::Lines]
      .into_iter()
      .map(|layout| (self.root.join(format!("{collection}.{}", layout.extension())), layout))
      .find(|(path, _)| path.is_file())
      .ok_or_else(|| Error::UnknownCollection(collection.to_owned()))
  }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
  move |source| Error::Io { path: path.to_owned(), source }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> Error + '_ {
  move |source| Error::Json { path: path.to_owned(), source }
}

fn read_array(path: &Path) -> Result<Vec<Document>> {
  let file = fs::File::open(path).map_err(io_error(path))?;
  let json: serde_json::Value =
    serde_json::from_reader(BufReader::new(file)).map_err(json_error(path))?;
  match json {
    serde_json::Value::Array(items) => items.into_iter().map(decode_document).collect(),
    single => Ok(vec![decode_document(single)?]),
  }
}

fn read_lines(path: &Path) -> Result<Vec<Document>> {
  let file = fs::File::open(path).map_err(io_error(path))?;
  let mut docs = vec![];
  for line in BufReader::new(file).lines() {
    let line = line.map_err(io_error(path))?;
    if line.trim().is_empty() {
      continue;
    }
    let json = serde_json::from_str(&line).map_err(json_error(path))?;
    docs.push(decode_document(json)?);
  }
  Ok(docs)
}

impl DocumentSource for JsonDirSource {
  type Error = Error;

  fn collections(&self) -> Result<Vec<String>> {
    let entries = fs::read_dir(&self.root).map_err(io_error(&self.root))?;
    let mut names = vec![];
    for entry in entries {
      let path = entry.map_err(io_error(&self.root))?.path();
      let is_collection = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Layout::from_extension)
        .is_some();
      if !is_collection || !path.is_file() {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        names.push(stem.to_owned());
      }
    }
    names.sort();
    names.dedup();
    Ok(names)
  }

  fn changed_since(
    &self,
    collection: &str,
    modified_field: &str,
    watermark: Option<&Value>,
  ) -> Result<Vec<Document>> {
    let docs = self.documents(collection)?;
    let Some(watermark) = watermark else {
      return Ok(docs);
    };
    Ok(
      docs
        .into_iter()
        .filter(|doc| {
          doc
            .get(modified_field)
            .is_some_and(|v| compare(v, watermark) == Some(Ordering::Greater))
        })
        .collect(),
    )
  }

  fn keys(&self, collection: &str, key_field: &str) -> Result<Vec<String>> {
    Ok(
      self
        .documents(collection)?
        .iter()
        .filter_map(|doc| doc.get(key_field).and_then(Value::canonical))
        .collect(),
    )
  }
}

// ─── Watermark comparison ────────────────────────────────────────────────────

/// Order two modification values. Text that parses as RFC 3339 compares as
/// a timestamp; values of unrelated kinds do not compare.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
    (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
    (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
      as_f64(a)?.partial_cmp(&as_f64(b)?)
    }
    (Value::Timestamp(_), Value::Text(s)) => compare(a, &Value::Timestamp(parse_timestamp(s)?)),
    (Value::Text(s), Value::Timestamp(_)) => compare(&Value::Timestamp(parse_timestamp(s)?), b),
    (Value::Text(x), Value::Text(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
      (Some(x), Some(y)) => Some(x.cmp(&y)),
      _ => Some(x.cmp(y)),
    },
    _ => None,
  }
}

fn as_f64(v: &Value) -> Option<f64> {
  match v {
    Value::Int(i) => Some(*i as f64),
    Value::Float(f) => Some(*f),
    _ => None,
  }
}
