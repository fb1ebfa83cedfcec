//! [`Engine`] — the end-to-end pipeline driver.
//!
//! A run is a pure function of the input batch plus the verification
//! oracle's answers: normalise, dedupe, derive, verify, synthesise. Stage
//! boundaries are ownership transfers; verification is the only stage that
//! performs I/O, and synthesis does not start until every claim has left
//! `Pending`.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;
use sift_core::{
  config::EngineConfig,
  evidence::SourceRecord,
  narrative::Narrative,
  oracle::VerificationResult,
};
use sift_oracle::Verifier;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
  Result, claims, dedupe, graph::RelationshipGraph, normalize,
  synthesize::{self, SynthesisInput},
  timeline,
};

// ─── Run output ──────────────────────────────────────────────────────────────

/// A source record dropped during normalisation. Quarantine is per record;
/// one malformed file never poisons the batch.
#[derive(Debug, Clone)]
pub struct Quarantined {
  pub origin: String,
  pub reason: String,
}

/// Operator-facing accounting for one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
  pub records_in:      usize,
  pub quarantined:     usize,
  pub evidence_total:  usize,
  pub evidence_merged: usize,
  pub claims_total:    usize,
  pub coherence:       f64,
  pub elapsed_ms:      u64,
}

#[derive(Debug)]
pub struct RunOutput {
  pub narrative:   Narrative,
  /// Post-dedupe corpus, for persisting alongside the narrative.
  pub evidence:    Vec<sift_core::evidence::EvidenceItem>,
  pub quarantined: Vec<Quarantined>,
  pub summary:     RunSummary,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine {
  config:   EngineConfig,
  verifier: Verifier,
}

impl Engine {
  pub fn new(config: EngineConfig, verifier: Verifier) -> Self {
    Self { config, verifier }
  }

  /// The verifier, for warming its cache from a store before a run and
  /// exporting it afterwards.
  pub fn verifier(&self) -> &Verifier { &self.verifier }

  /// Process one batch of source records into a [`Narrative`].
  ///
  /// Fails on an empty post-normalisation corpus and on cancellation;
  /// everything else (malformed records, unreachable authorities) degrades
  /// into quarantine entries or `Unverifiable` states.
  pub async fn run(
    &self,
    records: &[SourceRecord],
    cancel: &CancellationToken,
  ) -> Result<RunOutput> {
    let run_started = Utc::now();
    let clock = std::time::Instant::now();

    let (items, rejects) = normalize::normalize_all(records, run_started);
    let quarantined: Vec<Quarantined> = rejects
      .into_iter()
      .map(|(origin, error)| {
        warn!(%origin, %error, "source record quarantined");
        Quarantined { origin, reason: error.to_string() }
      })
      .collect();

    if items.is_empty() {
      return Err(crate::Error::EmptyCorpus);
    }

    let before_dedupe = items.len();
    let items = dedupe::dedupe(items, &self.config.dedupe);
    let evidence_merged = before_dedupe - items.len();
    let evidence_total = items.len();
    info!(
      records_in = records.len(),
      quarantined = quarantined.len(),
      evidence_total,
      evidence_merged,
      "corpus normalised"
    );

    let timeline = timeline::build(&items, &self.config.timeline);
    let edges = RelationshipGraph::build(&items, self.config.graph.clone());
    let mut claims = claims::derive(&items);

    for claim in &mut claims {
      claim.begin_verification()?;
    }
    let verifications = join_all(
      claims.iter().map(|claim| self.verifier.verify(claim, cancel)),
    )
    .await;

    let mut results: HashMap<String, VerificationResult> = HashMap::new();
    for (claim, verification) in claims.iter_mut().zip(verifications) {
      let result = verification?;
      claim.resolve(result.state)?;
      results.insert(claim.canonical_key(), result);
    }

    let claims_total = claims.len();
    let narrative = synthesize::synthesize(
      SynthesisInput {
        timeline,
        edges,
        claims,
        results,
        quarantined: quarantined.len(),
        evidence_merged,
        evidence_total,
      },
      &self.config.confidence,
      run_started,
    );

    let summary = RunSummary {
      records_in: records.len(),
      quarantined: quarantined.len(),
      evidence_total,
      evidence_merged,
      claims_total,
      coherence: narrative.coherence(),
      elapsed_ms: clock.elapsed().as_millis() as u64,
    };
    info!(
      claims = summary.claims_total,
      verified = narrative.integrity_summary.verified,
      rejected = narrative.integrity_summary.rejected,
      unverifiable = narrative.integrity_summary.unverifiable,
      conflicts = narrative.integrity_summary.conflicts.len(),
      coherence = summary.coherence,
      elapsed_ms = summary.elapsed_ms,
      "run complete"
    );

    Ok(RunOutput { narrative, evidence: items, quarantined, summary })
  }
}
