//! The mirror run: a load phase over every collection, then a deletion
//! sweep over every collection.
//!
//! Each collection's load and each collection's sweep is its own
//! transaction. The first error aborts the run; collections committed
//! before it stay committed.

use anyhow::Context as _;
use tidemark_core::{
  DocumentSource, LoadOptions, LoadReport, SweepOutcome, load_documents, sweep_deleted, watermark,
};
use tidemark_store_sqlite::SqliteStore;
use tracing::{info, warn};

/// What to mirror and how.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub load:        LoadOptions,
  /// Restrict the run to these collections. Empty means all of them.
  pub collections: Vec<String>,
  pub skip_sweep:  bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
  pub loaded: Vec<(String, LoadReport)>,
  pub swept:  Vec<(String, SweepOutcome)>,
}

pub fn run<S: DocumentSource>(
  source: &S,
  store: &mut SqliteStore,
  opts: &RunOptions,
) -> anyhow::Result<RunSummary> {
  let collections = select_collections(source, &opts.collections)?;
  let mut summary = RunSummary::default();

  // ─── Load ──────────────────────────────────────────────────────────────────

  for name in &collections {
    if let Some(report) =
      load_collection(source, store, name, &opts.load).with_context(|| format!("failed to load {name}"))?
    {
      summary.loaded.push((name.clone(), report));
    }
  }

  // ─── Deletion sweep ────────────────────────────────────────────────────────

  if opts.skip_sweep {
    info!("deletion sweep skipped");
    return Ok(summary);
  }

  for name in &collections {
    let keys = source
      .keys(name, &opts.load.key_field)
      .with_context(|| format!("failed to read keys of {name}"))?;
    if keys.is_empty() {
      info!(collection = %name, "no source keys, sweep skipped");
      continue;
    }

    let tx = store.begin()?;
    let outcome = sweep_deleted(&tx, name, &opts.load.key_field, &keys)
      .with_context(|| format!("failed to sweep {name}"))?;
    tx.commit()?;
    summary.swept.push((name.clone(), outcome));
  }

  Ok(summary)
}

fn select_collections<S: DocumentSource>(source: &S, wanted: &[String]) -> anyhow::Result<Vec<String>> {
  let available = source.collections().context("failed to list collections")?;
  if wanted.is_empty() {
    return Ok(available);
  }
  for name in wanted.iter().filter(|w| !available.contains(w)) {
    warn!(collection = %name, "requested collection not found");
  }
  Ok(available.into_iter().filter(|c| wanted.contains(c)).collect())
}

/// Load the documents of `name` changed since the table's watermark.
/// Returns `None` when nothing changed.
fn load_collection<S: DocumentSource>(
  source: &S,
  store: &mut SqliteStore,
  name: &str,
  opts: &LoadOptions,
) -> anyhow::Result<Option<LoadReport>> {
  let tx = store.begin()?;
  let mark = watermark(&tx, name, &opts.modified_field)?;
  let docs = source.changed_since(name, &opts.modified_field, mark.as_ref())?;
  if docs.is_empty() {
    info!(collection = name, "up to date");
    return Ok(None);
  }

  info!(collection = name, documents = docs.len(), watermark = ?mark, "loading");
  let report = load_documents(&tx, name, docs, opts)?;
  tx.commit()?;
  Ok(Some(report))
}
