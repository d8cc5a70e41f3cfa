//! `libris`: command-line front end for the library backend.
//!
//! # Usage
//!
//! ```text
//! libris --url http://localhost:8000/api --as 1 issues --status overdue
//! libris --config ~/.config/libris/libris.toml return 42
//! libris --offline books --search fiction
//! ```

mod commands;
mod config;
mod demo;
mod render;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use commands::{Command, Session};
use crate::config::ClientConfig;
use libris_client::HttpBackend;
use libris_core::{library::Library, user::UserId};
use settings::SettingsStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "libris", version, about = "Library dashboard client")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "libris.toml")]
  config: PathBuf,

  /// Base URL of the library API.
  #[arg(long, env = "LIBRIS_URL")]
  url: Option<String>,

  /// Id of the user guarded commands act as.
  #[arg(long = "as", env = "LIBRIS_USER", value_name = "USER_ID")]
  actor: Option<UserId>,

  /// Run against a seeded in-memory library instead of the API.
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  match run(Cli::parse()).await {
    Ok(output) => {
      println!("{output}");
      ExitCode::SUCCESS
    }
    Err(e) => {
      eprintln!("error: {e:#}");
      ExitCode::FAILURE
    }
  }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
  // Flags override the environment, which overrides the file.
  let mut cfg = ClientConfig::load(&cli.config)?;
  if let Some(url) = cli.url {
    cfg.base_url = url;
  }
  if let Some(actor) = cli.actor {
    cfg.actor_id = Some(actor);
  }
  let settings = SettingsStore::new(cfg.settings_dir.clone());

  if cli.offline {
    let demo = demo::seed();
    let session = Session {
      actor: cfg.actor_id.or(Some(demo.librarian)),
      settings,
    };
    let mut lib = Library::new(demo.store);
    return commands::run(&mut lib, &session, cli.command).await;
  }

  tracing::debug!(url = %cfg.base_url, "using remote backend");
  let session = Session {
    actor: cfg.actor_id,
    settings,
  };
  let mut lib = Library::new(HttpBackend::new(cfg.http())?);
  commands::run(&mut lib, &session, cli.command).await
}
