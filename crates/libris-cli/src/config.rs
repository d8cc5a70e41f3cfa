//! Client configuration: defaults, then the TOML file, then `LIBRIS_*`
//! environment variables. Command-line flags are applied last by `main`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, Result};
use libris_client::HttpConfig;
use libris_core::user::UserId;
use serde::Deserialize;

pub const DEFAULT_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  pub base_url:     String,
  pub timeout_secs: u64,
  pub settings_dir: PathBuf,
  /// The user guarded commands act as.
  #[serde(default)]
  pub actor_id:     Option<UserId>,
}

impl ClientConfig {
  pub fn load(file: &Path) -> Result<Self> {
    let settings = ::config::Config::builder()
      .set_default("base_url", DEFAULT_URL)?
      .set_default("timeout_secs", 30)?
      .set_default("settings_dir", "~/.config/libris/settings")?
      .add_source(::config::File::from(file.to_path_buf()).required(false))
      .add_source(::config::Environment::with_prefix("LIBRIS").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ClientConfig")?;
    cfg.settings_dir = expand_tilde(&cfg.settings_dir);
    Ok(cfg)
  }

  pub fn http(&self) -> HttpConfig {
    HttpConfig::new(self.base_url.clone()).with_timeout(Duration::from_secs(self.timeout_secs))
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
