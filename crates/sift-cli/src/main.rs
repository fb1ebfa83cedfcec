//! `sift` batch binary.
//!
//! Reads a JSON batch of source records, runs the correlation and synthesis
//! engine against it, persists the corpus and verification cache to SQLite,
//! and writes the resulting narrative as JSON.
//!
//! Configuration comes from `config.toml` (or the path given with
//! `--config`), overridable through `SIFT_`-prefixed environment variables.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use sift_core::{config::EngineConfig, evidence::SourceRecord, store::CorpusStore as _};
use sift_engine::Engine;
use sift_oracle::{Authority, HttpAuthority, Verifier};
use sift_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Evidence correlation and synthesis")]
struct Cli {
  /// JSON file holding the batch of source records to process.
  input: PathBuf,

  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Where to write the narrative JSON.
  #[arg(short, long, default_value = "narrative.json")]
  output: PathBuf,
}

/// One external verification authority.
#[derive(Debug, Clone, Deserialize)]
struct AuthorityEntry {
  name:     String,
  endpoint: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
  /// SQLite file holding the corpus and verification cache.
  store_path:  Option<String>,
  /// Authorities consulted in order; empty means every claim ends the run
  /// unverifiable.
  authorities: Vec<AuthorityEntry>,
  engine:      EngineConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("SIFT").separator("__"))
    .build()
    .context("failed to read config file")?;
  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  let store_path =
    expand_tilde(cfg.store_path.as_deref().unwrap_or("sift.db"));
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let records: Vec<SourceRecord> = {
    let text = tokio::fs::read_to_string(&cli.input)
      .await
      .with_context(|| format!("failed to read {:?}", cli.input))?;
    serde_json::from_str(&text)
      .with_context(|| format!("failed to parse {:?}", cli.input))?
  };

  if cfg.authorities.is_empty() {
    warn!("no verification authorities configured; claims will end unverifiable");
  }
  let authorities: Vec<Arc<dyn Authority>> = cfg
    .authorities
    .iter()
    .map(|a| {
      Arc::new(HttpAuthority::new(&a.name, &a.endpoint)) as Arc<dyn Authority>
    })
    .collect();
  let verifier = Verifier::new(authorities, cfg.engine.verify.clone());

  // Warm the in-memory cache from previous runs before touching the network.
  let persisted = store
    .load_verifications()
    .await
    .context("failed to load verification cache")?;
  let warmed = verifier.cache().warm(persisted);
  info!(warmed, "verification cache loaded");

  let cancel = CancellationToken::new();
  let ctrl_c_cancel = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received; cancelling run");
      ctrl_c_cancel.cancel();
    }
  });

  let run_id = Uuid::new_v4();
  info!(%run_id, records = records.len(), "starting run");

  let engine = Engine::new(cfg.engine, verifier);
  let run = engine.run(&records, &cancel).await;

  // Flush the verification cache before surfacing a run error: results
  // completed ahead of an interrupt stay reusable by the next run.
  for (key, result) in engine.verifier().cache().export() {
    store
      .put_verification(&key, &result)
      .await
      .context("failed to persist verification cache")?;
  }
  let cutoff = engine.verifier().cache().expiry_cutoff(Utc::now());
  let pruned = store
    .prune_verifications(cutoff)
    .await
    .context("failed to prune verification cache")?;
  if pruned > 0 {
    info!(pruned, "expired verification entries removed");
  }

  let out = run.context("run failed")?;

  for item in &out.evidence {
    store
      .insert_evidence(item)
      .await
      .with_context(|| format!("failed to persist evidence {}", item.id))?;
  }

  let narrative_json = serde_json::to_string_pretty(&out.narrative)
    .context("failed to serialise narrative")?;
  tokio::fs::write(&cli.output, narrative_json)
    .await
    .with_context(|| format!("failed to write {:?}", cli.output))?;

  info!(
    %run_id,
    output = ?cli.output,
    evidence = out.summary.evidence_total,
    merged = out.summary.evidence_merged,
    quarantined = out.summary.quarantined,
    claims = out.summary.claims_total,
    coherence = out.summary.coherence,
    elapsed_ms = out.summary.elapsed_ms,
    "narrative written"
  );
  for q in &out.quarantined {
    warn!(origin = %q.origin, reason = %q.reason, "quarantined record");
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
  if let Some(rest) = path.strip_prefix("~/") {
    if let Some(home) = std::env::var_os("HOME") {
      return Path::new(&home).join(rest);
    }
  }
  PathBuf::from(path)
}
