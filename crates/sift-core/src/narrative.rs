//! Narrative types — the synthesised, confidence-scored output.
//!
//! A narrative is materialised once per synthesis run and immutable after
//! return; a re-run over the same corpus produces a new, comparable value
//! rather than mutating a shared one. All derived structures reference
//! evidence by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{claim::Claim, evidence::EvidenceId};

// ─── Timeline ────────────────────────────────────────────────────────────────

/// How a timeline position was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingBasis {
  /// The item carried a known, unambiguous timestamp.
  KnownTimestamp,
  /// Placed after another item its text explicitly references.
  CausalInference,
  /// Deterministic last-resort placement by ingestion sequence.
  IngestionOrder,
}

/// One position in the reconstructed timeline. `order_key` is a total-order
/// key: no two entries in a timeline share one, and the same corpus always
/// yields the same keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub evidence_id:         EvidenceId,
  pub order_key:           u64,
  pub ordering_confidence: f64,
  pub basis:               OrderingBasis,
}

// ─── Relationship graph ──────────────────────────────────────────────────────

/// A weighted interaction edge between two actors. Undirected for existence
/// (at most one edge per unordered pair, with `actor_a < actor_b`); the
/// direction of dominant initiation is an attribute, not edge identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
  pub actor_a:           String,
  pub actor_b:           String,
  pub interaction_count: u32,
  /// Earliest known co-occurrence; `None` when every interaction so far had
  /// an unknown timestamp.
  pub first_seen:        Option<DateTime<Utc>>,
  pub last_seen:         Option<DateTime<Utc>>,
  /// Incrementally-updated strength; monotone in interaction count.
  pub weight:            f64,
  /// Interactions initiated by `actor_a` / `actor_b` respectively.
  pub initiations_a:     u32,
  pub initiations_b:     u32,
}

impl RelationshipEdge {
  pub fn new(actor_a: String, actor_b: String) -> Self {
    debug_assert!(actor_a < actor_b);
    Self {
      actor_a,
      actor_b,
      interaction_count: 0,
      first_seen: None,
      last_seen: None,
      weight: 0.0,
      initiations_a: 0,
      initiations_b: 0,
    }
  }

  /// The actor who initiated the majority of interactions, if either did.
  pub fn dominant_initiator(&self) -> Option<&str> {
    match self.initiations_a.cmp(&self.initiations_b) {
      std::cmp::Ordering::Greater => Some(&self.actor_a),
      std::cmp::Ordering::Less => Some(&self.actor_b),
      std::cmp::Ordering::Equal => None,
    }
  }
}

// ─── Integrity summary ───────────────────────────────────────────────────────

/// Two claims that share subject+predicate, disagree on object, and tied on
/// both verification rank and support count. Retained as data — silent
/// conflict elision is disallowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedConflict {
  pub subject:   String,
  pub predicate: String,
  pub objects:   Vec<String>,
}

/// Accounting for a synthesis run. Every claim considered lands in exactly
/// one verification-state bucket; nothing is silently omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegritySummary {
  pub verified:     usize,
  pub rejected:     usize,
  pub unverifiable: usize,
  pub unverified:   usize,
  pub pending:      usize,
  /// Conflicts retained in the output rather than resolved.
  pub conflicts:    Vec<UnresolvedConflict>,
  /// Source records quarantined during normalisation.
  pub quarantined:  usize,
  /// Evidence items after deduplication.
  pub evidence_total:  usize,
  /// Items absorbed into survivors by the deduplicator.
  pub evidence_merged: usize,
  /// Claims satisfied from cache entries older than the run start.
  pub stale_verifications: usize,
}

impl IntegritySummary {
  pub fn claims_total(&self) -> usize {
    self.verified
      + self.rejected
      + self.unverifiable
      + self.unverified
      + self.pending
  }
}

// ─── Narrative ───────────────────────────────────────────────────────────────

/// Top-level synthesis output: ordered timeline, relationship edges, scored
/// claims, and the integrity summary. The engine's sole externally consumed
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
  pub generated_at:      DateTime<Utc>,
  pub timeline:          Vec<TimelineEntry>,
  pub edges:             Vec<RelationshipEdge>,
  pub claims:            Vec<Claim>,
  pub integrity_summary: IntegritySummary,
}

impl Narrative {
  /// Overall reconstruction coherence: mean ordering confidence weighted
  /// against the verified share of claims. Purely descriptive — nothing in
  /// the engine branches on it.
  pub fn coherence(&self) -> f64 {
    let ordering = if self.timeline.is_empty() {
      0.0
    } else {
      self
        .timeline
        .iter()
        .map(|e| e.ordering_confidence)
        .sum::<f64>()
        / self.timeline.len() as f64
    };
    let total = self.integrity_summary.claims_total();
    let verified_share = if total == 0 {
      0.0
    } else {
      self.integrity_summary.verified as f64 / total as f64
    };
    ((ordering + verified_share) / 2.0).clamp(0.0, 1.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dominant_initiator_tracks_counts() {
    let mut edge = RelationshipEdge::new("alice".into(), "bob".into());
    assert_eq!(edge.dominant_initiator(), None);

    edge.initiations_a = 3;
    edge.initiations_b = 1;
    assert_eq!(edge.dominant_initiator(), Some("alice"));

    edge.initiations_b = 3;
    assert_eq!(edge.dominant_initiator(), None);
  }

  #[test]
  fn summary_total_sums_buckets() {
    let summary = IntegritySummary {
      verified: 2,
      rejected: 1,
      unverifiable: 3,
      unverified: 0,
      pending: 0,
      ..Default::default()
    };
    assert_eq!(summary.claims_total(), 6);
  }
}
