//! Runtime configuration, read from `tidemark.toml` and `TIDEMARK_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use tidemark_core::LoadOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
  /// Directory of `<collection>.json` / `<collection>.jsonl` exports.
  pub source_dir:     PathBuf,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path:     PathBuf,
  #[serde(default = "default_key_field")]
  pub key_field:      String,
  #[serde(default = "default_modified_field")]
  pub modified_field: String,
}

fn default_key_field() -> String { LoadOptions::default().key_field }

fn default_modified_field() -> String { LoadOptions::default().modified_field }

impl MirrorConfig {
  /// Layer the (optional) file at `path` under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("TIDEMARK"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise MirrorConfig")?;
    cfg.source_dir = expand_tilde(&cfg.source_dir);
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn load_options(&self) -> LoadOptions {
    LoadOptions {
      key_field:      self.key_field.clone(),
      modified_field: self.modified_field.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
