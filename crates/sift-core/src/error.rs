//! Error types for `sift-core`.
//!
//! Per-record defects (`MalformedSource`) are quarantined by the pipeline and
//! reported in the run summary; they never abort a run. Only whole-corpus
//! structural failures (`EmptyCorpus`) do. Verification exhaustion is *not*
//! an error — it is the `Unverifiable` state.

use thiserror::Error;

use crate::{claim::VerificationState, evidence::EvidenceId};

#[derive(Debug, Error)]
pub enum Error {
  /// A single source record could not be normalised. Recoverable at the
  /// corpus level: the record is quarantined and processing continues.
  #[error("malformed source record from {origin}: {reason}")]
  MalformedSource { origin: String, reason: String },

  /// A provenance digest no longer matches the evidence body. Fatal for the
  /// item — synthesis must not proceed on tainted evidence.
  #[error("integrity violation on evidence {id}: expected digest {expected}, got {actual}")]
  IntegrityViolation {
    id:       EvidenceId,
    expected: String,
    actual:   String,
  },

  /// No evidence items survived normalisation; there is nothing to analyse.
  #[error("no evidence items survived normalisation")]
  EmptyCorpus,

  /// A claim with no supporting evidence is invalid and is never constructed.
  #[error("claim has no supporting evidence")]
  EmptySupport,

  /// Attempted to move a claim out of a terminal verification state.
  #[error("invalid verification transition: {from} -> {to}")]
  TerminalTransition {
    from: VerificationState,
    to:   VerificationState,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
