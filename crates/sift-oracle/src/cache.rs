//! TTL cache for verification results.
//!
//! Keyed by the canonical claim form. A hit inside the TTL short-circuits
//! the verification state machine directly to the cached terminal state
//! without a network call; entries keep their original `verified_at` so the
//! synthesizer can flag staleness. Entries survive across runs when a
//! persistent store reloads them at startup.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sift_core::oracle::VerificationResult;

pub struct VerificationCache {
  entries: DashMap<String, VerificationResult>,
  ttl:     Duration,
}

impl VerificationCache {
  pub fn new(ttl_secs: i64) -> Self {
    Self {
      entries: DashMap::new(),
      ttl:     Duration::seconds(ttl_secs),
    }
  }

  /// Look up a live entry. Expired entries are evicted on the way.
  /// The returned result is marked `from_cache`.
  pub fn get(&self, claim_key: &str) -> Option<VerificationResult> {
    let now = Utc::now();
    if let Some(entry) = self.entries.get(claim_key) {
      if now - entry.verified_at <= self.ttl {
        let mut result = entry.clone();
        result.from_cache = true;
        return Some(result);
      }
    }
    // Expired; drop it so the map doesn't accumulate dead entries.
    self
      .entries
      .remove_if(claim_key, |_, v| now - v.verified_at > self.ttl);
    None
  }

  pub fn put(&self, claim_key: String, result: VerificationResult) {
    self.entries.insert(claim_key, result);
  }

  /// Warm the cache from persisted entries, skipping any already expired.
  pub fn warm(
    &self,
    entries: impl IntoIterator<Item = (String, VerificationResult)>,
  ) -> usize {
    let now = Utc::now();
    let mut loaded = 0;
    for (key, result) in entries {
      if now - result.verified_at <= self.ttl {
        self.entries.insert(key, result);
        loaded += 1;
      }
    }
    loaded
  }

  /// Snapshot every live entry, e.g. for persistence at the end of a run.
  pub fn export(&self) -> Vec<(String, VerificationResult)> {
    let now = Utc::now();
    self
      .entries
      .iter()
      .filter(|e| now - e.verified_at <= self.ttl)
      .map(|e| (e.key().clone(), e.value().clone()))
      .collect()
  }

  /// Drop all entries older than the TTL; returns how many were removed.
  pub fn prune(&self) -> usize {
    let cutoff = self.expiry_cutoff(Utc::now());
    let before = self.entries.len();
    self.entries.retain(|_, v| v.verified_at >= cutoff);
    before - self.entries.len()
  }

  /// The instant before which entries are considered expired, relative to
  /// `now`. Exposed so persistent stores can prune with the same rule.
  pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - self.ttl
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
