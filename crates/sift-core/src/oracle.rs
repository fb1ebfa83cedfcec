//! The external verification boundary.
//!
//! Every external authority — case-law database, legislation register,
//! court-list service — is wrapped behind the uniform [`Authority`] contract.
//! The verification client (`sift-oracle`) treats all authorities
//! identically regardless of how many are configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claim::{Claim, VerificationState};

// ─── Query and outcome ───────────────────────────────────────────────────────

/// What is sent to an authority: the claim triple plus its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupQuery {
  pub subject:   String,
  pub predicate: String,
  pub object:    String,
  /// Canonical claim form; doubles as the cache/coalescing key.
  pub canonical: String,
}

impl LookupQuery {
  pub fn from_claim(claim: &Claim) -> Self {
    Self {
      subject:   claim.subject.clone(),
      predicate: claim.predicate.clone(),
      object:    claim.object.clone(),
      canonical: claim.canonical_key(),
    }
  }
}

/// An authority's answer, per the external contract:
/// `lookup(query) -> {matched, contradicted, reference_id, confidence}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOutcome {
  pub matched:      bool,
  pub contradicted: bool,
  /// Source-backed reference (citation id, register entry) when matched.
  pub reference_id: Option<String>,
  pub confidence:   f64,
}

// ─── Lookup errors ───────────────────────────────────────────────────────────

/// Failure modes of a single authority call. Transient variants are eligible
/// for bounded retry; the rest are not.
#[derive(Debug, Error)]
pub enum LookupError {
  #[error("transient lookup failure: {0}")]
  Transient(String),

  #[error("lookup timed out")]
  Timeout,

  #[error("authority rate limited the request")]
  RateLimited,

  #[error("authority failure: {0}")]
  Failed(String),
}

impl LookupError {
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Transient(_) | Self::Timeout | Self::RateLimited)
  }
}

// ─── Authority trait ─────────────────────────────────────────────────────────

/// One external authoritative source. Implementations live outside the core
/// (HTTP clients in `sift-oracle`, scripted doubles in tests).
#[async_trait]
pub trait Authority: Send + Sync {
  /// Human-readable authority name, used in provenance and logs.
  fn name(&self) -> &str;

  async fn lookup(
    &self,
    query: &LookupQuery,
  ) -> Result<LookupOutcome, LookupError>;
}

// ─── Verification result ─────────────────────────────────────────────────────

/// The verification client's answer for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
  /// Terminal outcome state: verified, rejected, or unverifiable.
  pub state:            VerificationState,
  /// Signed contribution of the oracle answer: positive for a match,
  /// negative for a contradiction, zero when inconclusive.
  pub confidence_delta: f64,
  /// Which authority answered, and with what reference.
  pub source_reference: Option<String>,
  /// When the answer was produced. Cache hits keep their original
  /// timestamp so the synthesizer can flag staleness.
  pub verified_at:      DateTime<Utc>,
  /// Whether this result was served from cache without a network call.
  pub from_cache:       bool,
}
