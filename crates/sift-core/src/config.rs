//! Engine configuration.
//!
//! Every threshold the engine consults lives here and is externally
//! overridable (TOML file or environment via the CLI layer); none of them
//! are hidden constants. Defaults match the documented behaviour of the
//! original intelligence tooling where one existed.

use serde::{Deserialize, Serialize};

use crate::claim::VerificationState;

// ─── Deduplication ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
  /// Token-set similarity above which two items with intersecting actor
  /// sets are merge candidates.
  pub similarity_threshold:    f64,
  /// Two known timestamps further apart than this are never duplicates.
  pub timestamp_tolerance_secs: i64,
  /// Adapter names in descending trust order; breaks earliest-timestamp
  /// ties during merges. Adapters not listed rank last, alphabetically.
  pub adapter_priority:        Vec<String>,
}

impl Default for DedupeConfig {
  fn default() -> Self {
    Self {
      similarity_threshold:     0.6,
      timestamp_tolerance_secs: 300,
      adapter_priority:         vec![
        "mail-export".into(),
        "document-scan".into(),
        "feed-monitor".into(),
      ],
    }
  }
}

// ─── Timeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
  /// Ordering confidence for items placed via causal inference.
  pub causal_confidence:   f64,
  /// Ordering confidence for the ingestion-sequence fallback.
  pub fallback_confidence: f64,
  /// Minimum length of a quoted line before it counts as a textual
  /// reference to another item.
  pub min_reference_len:   usize,
}

impl Default for TimelineConfig {
  fn default() -> Self {
    Self {
      causal_confidence:   0.6,
      fallback_confidence: 0.2,
      min_reference_len:   40,
    }
  }
}

// ─── Relationship graph ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
  /// Weight contribution of one message-like co-occurrence.
  pub message_weight:      f64,
  /// Weight contribution of one document co-party mention. Legal documents
  /// bind parties more strongly than a single message does.
  pub document_weight:     f64,
  /// Extra weight when an interaction lands within the recency window of
  /// the previous one on the same edge.
  pub recency_bonus:       f64,
  pub recency_window_secs: i64,
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      message_weight:      1.0,
      document_weight:     5.0,
      recency_bonus:       0.25,
      recency_window_secs: 7 * 24 * 3600,
    }
  }
}

// ─── Verification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
  /// Maximum lookup attempts per authority before the claim is treated as
  /// unverifiable by that authority.
  pub max_attempts:    u32,
  /// Base delay for exponential backoff between retries.
  pub backoff_base_ms: u64,
  /// Per-external-call timeout. Timeouts are per call, not per run.
  pub call_timeout_ms: u64,
  /// Admission-control bound on concurrent in-flight external calls.
  pub max_in_flight:   usize,
  /// Time-to-live of cached verification results.
  pub cache_ttl_secs:  i64,
  /// Oracle confidence floor below which a positive match does not verify.
  pub verified_floor:  f64,
}

impl Default for VerifyConfig {
  fn default() -> Self {
    Self {
      max_attempts:    3,
      backoff_base_ms: 200,
      call_timeout_ms: 10_000,
      max_in_flight:   4,
      cache_ttl_secs:  7 * 24 * 3600,
      verified_floor:  0.8,
    }
  }
}

// ─── Claim confidence ────────────────────────────────────────────────────────

/// Weights for the monotonic combination of verification state and
/// corroborating-evidence count that yields a claim's final confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
  pub verified_base:     f64,
  pub pending_base:      f64,
  pub unverified_base:   f64,
  pub unverifiable_base: f64,
  pub rejected_base:     f64,
  /// Added once per corroborating item beyond the first.
  pub corroboration_weight: f64,
}

impl Default for ConfidenceWeights {
  fn default() -> Self {
    Self {
      verified_base:        0.9,
      pending_base:         0.5,
      unverified_base:      0.4,
      unverifiable_base:    0.3,
      rejected_base:        0.05,
      corroboration_weight: 0.05,
    }
  }
}

impl ConfidenceWeights {
  /// Monotonic in both inputs, clipped to [0, 1].
  pub fn combine(&self, state: VerificationState, support: usize) -> f64 {
    let base = match state {
      VerificationState::Verified => self.verified_base,
      VerificationState::Pending => self.pending_base,
      VerificationState::Unverified => self.unverified_base,
      VerificationState::Unverifiable => self.unverifiable_base,
      VerificationState::Rejected => self.rejected_base,
    };
    let corroboration =
      self.corroboration_weight * support.saturating_sub(1) as f64;
    (base + corroboration).clamp(0.0, 1.0)
  }
}

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub dedupe:     DedupeConfig,
  pub timeline:   TimelineConfig,
  pub graph:      GraphConfig,
  pub verify:     VerifyConfig,
  pub confidence: ConfidenceWeights,
}
