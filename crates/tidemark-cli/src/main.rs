//! `tidemark`: mirror document-store collection exports into SQLite.
//!
//! # Usage
//!
//! ```text
//! tidemark --config ~/.config/tidemark/tidemark.toml
//! tidemark --collection users --collection orders --skip-sweep
//! ```
//!
//! Every setting can also be given as a `TIDEMARK_*` environment variable,
//! e.g. `TIDEMARK_STORE_PATH=/srv/mirror.db`.

mod run;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tidemark_source_json::JsonDirSource;
use tidemark_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  run::{RunOptions, run},
  settings::MirrorConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror document collections into SQLite")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tidemark.toml")]
  config: PathBuf,

  /// Only mirror this collection. Repeatable.
  #[arg(long = "collection", value_name = "NAME")]
  collections: Vec<String>,

  /// Load changed documents but do not soft-delete vanished keys.
  #[arg(long)]
  skip_sweep: bool,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = MirrorConfig::load(&cli.config)?;

  let source = JsonDirSource::new(&cfg.source_dir);
  let mut store = SqliteStore::open(&cfg.store_path)
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  let opts = RunOptions {
    load:        cfg.load_options(),
    collections: cli.collections,
    skip_sweep:  cli.skip_sweep,
  };
  let summary = run(&source, &mut store, &opts)?;

  tracing::info!(
    loaded = summary.loaded.len(),
    swept = summary.swept.len(),
    "mirror run complete"
  );
  Ok(())
}
