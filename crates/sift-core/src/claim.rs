//! Claim types — atomic factual assertions derived from evidence.
//!
//! A claim is a subject/predicate/object triple backed by a non-empty set of
//! evidence ids. Its verification state moves through an explicit state
//! machine; confidence is earned per claim, never assumed system-wide.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, config::ConfidenceWeights, evidence::EvidenceId,
};

// ─── Verification state machine ──────────────────────────────────────────────

/// Verification state of a claim.
///
/// `Unverified -> Pending` when a verification call is dispatched;
/// `Pending -> {Verified, Rejected, Unverifiable}` on an oracle answer.
/// `Verified` and `Rejected` are terminal for a given evidence snapshot.
/// `Unverifiable` is terminal for the current run but eligible for
/// re-verification in a subsequent run (source catalogs update).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
  Unverified,
  Pending,
  Verified,
  Rejected,
  Unverifiable,
}

impl VerificationState {
  /// Rank used by the conflict-resolution rule:
  /// verified > pending > unverified > unverifiable > rejected.
  pub fn rank(&self) -> u8 {
    match self {
      Self::Verified => 4,
      Self::Pending => 3,
      Self::Unverified => 2,
      Self::Unverifiable => 1,
      Self::Rejected => 0,
    }
  }

  /// Terminal within a single evidence snapshot.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Verified | Self::Rejected | Self::Unverifiable)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Unverified => "unverified",
      Self::Pending => "pending",
      Self::Verified => "verified",
      Self::Rejected => "rejected",
      Self::Unverifiable => "unverifiable",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "unverified" => Some(Self::Unverified),
      "pending" => Some(Self::Pending),
      "verified" => Some(Self::Verified),
      "rejected" => Some(Self::Rejected),
      "unverifiable" => Some(Self::Unverifiable),
      _ => None,
    }
  }
}

impl std::fmt::Display for VerificationState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Claim ───────────────────────────────────────────────────────────────────

/// An atomic factual assertion in structured triple form, e.g.
/// (actor, "communicated_with", actor) or
/// (actor, "referenced_citation", citation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
  pub subject:   String,
  pub predicate: String,
  pub object:    String,
  /// Evidence ids backing this claim. Never empty.
  pub supporting_evidence: BTreeSet<EvidenceId>,
  pub verification_state:  VerificationState,
  /// Derived from verification state and corroboration count; recomputed
  /// whenever either input changes, never frozen. Always in [0, 1].
  pub confidence: f64,
}

impl Claim {
  /// Construct a claim. Fails with [`Error::EmptySupport`] if the supporting
  /// evidence set is empty — an unsupported claim must not exist.
  pub fn new(
    subject: impl Into<String>,
    predicate: impl Into<String>,
    object: impl Into<String>,
    supporting_evidence: BTreeSet<EvidenceId>,
  ) -> Result<Self> {
    if supporting_evidence.is_empty() {
      return Err(Error::EmptySupport);
    }
    Ok(Self {
      subject: subject.into(),
      predicate: predicate.into(),
      object: object.into(),
      supporting_evidence,
      verification_state: VerificationState::Unverified,
      confidence: 0.0,
    })
  }

  /// Canonical form of the triple, used as the verification cache key and
  /// the request-coalescing key. Whitespace-insensitive and case-folded so
  /// trivially different renderings of the same claim share one entry.
  pub fn canonical_key(&self) -> String {
    fn fold(s: &str) -> String {
      s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
    format!(
      "{}|{}|{}",
      fold(&self.subject),
      fold(&self.predicate),
      fold(&self.object)
    )
  }

  pub fn support_count(&self) -> usize { self.supporting_evidence.len() }

  /// `Unverified -> Pending`, recorded when a verification call is
  /// dispatched. Any other starting state is a transition error.
  pub fn begin_verification(&mut self) -> Result<()> {
    match self.verification_state {
      VerificationState::Unverified => {
        self.verification_state = VerificationState::Pending;
        Ok(())
      }
      from => Err(Error::TerminalTransition {
        from,
        to: VerificationState::Pending,
      }),
    }
  }

  /// Apply an oracle answer: `Pending -> {Verified, Rejected, Unverifiable}`.
  /// Transitions out of a terminal state are rejected — a claim never leaves
  /// `Verified` or `Rejected` within a single evidence snapshot.
  pub fn resolve(&mut self, outcome: VerificationState) -> Result<()> {
    let from = self.verification_state;
    let valid = from == VerificationState::Pending && outcome.is_terminal();
    if !valid {
      return Err(Error::TerminalTransition { from, to: outcome });
    }
    self.verification_state = outcome;
    Ok(())
  }

  /// Recompute confidence from the current state and corroboration count.
  pub fn recompute_confidence(&mut self, weights: &ConfidenceWeights) {
    self.confidence = weights
      .combine(self.verification_state, self.support_count());
  }
}
