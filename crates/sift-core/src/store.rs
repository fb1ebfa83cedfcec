//! The `CorpusStore` trait.
//!
//! Implemented by storage backends (e.g. `sift-store-sqlite`). The engine
//! and CLI depend on this abstraction, not on any concrete backend. A store
//! holds two things: the evidence corpus for a matter (with its chain of
//! custody) and the verification cache that survives across runs.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{evidence::EvidenceItem, oracle::VerificationResult};

/// Abstraction over a Sift persistence backend.
///
/// Evidence writes are append-only; re-inserting an existing id replaces the
/// row wholesale (same id means same evidence by invariant). Reads must
/// verify the chain-of-custody digest of every item and fail on mismatch
/// rather than return tainted evidence.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait CorpusStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Evidence ──────────────────────────────────────────────────────────

  /// Persist one evidence item together with its full provenance chain.
  fn insert_evidence(
    &self,
    item: &EvidenceItem,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Load the whole corpus in ingestion order, verifying every item's
  /// integrity digest on the way out.
  fn load_evidence(
    &self,
  ) -> impl Future<Output = Result<Vec<EvidenceItem>, Self::Error>> + Send + '_;

  // ── Verification cache ────────────────────────────────────────────────

  /// Record a verification result under its canonical claim key.
  fn put_verification(
    &self,
    claim_key: &str,
    result: &VerificationResult,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a cached result, if any. TTL enforcement is the caller's job —
  /// the stored `verified_at` carries the information needed.
  fn get_verification(
    &self,
    claim_key: &str,
  ) -> impl Future<Output = Result<Option<VerificationResult>, Self::Error>>
  + Send
  + '_;

  /// Load every cached verification, e.g. to warm the in-memory cache at
  /// the start of a run.
  fn load_verifications(
    &self,
  ) -> impl Future<
    Output = Result<Vec<(String, VerificationResult)>, Self::Error>,
  > + Send
  + '_;

  /// Delete cache entries older than `cutoff`; returns how many went.
  fn prune_verifications(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
