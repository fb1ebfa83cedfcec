//! Evidence deduplication.
//!
//! Collapses near-identical items — the same message reappearing across
//! several exports — while keeping the chain of custody of every merged
//! source. Stable: survivors keep first-seen order, and the pass is
//! idempotent.
//!
//! Two items are duplicates iff their ids match, OR their normalised text
//! similarity clears the configured threshold AND their actor sets
//! intersect AND their timestamps (when both known) fall within the
//! tolerance window. A pure metadata match is never enough: distinct
//! messages share boilerplate all the time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sift_core::{
  config::DedupeConfig,
  evidence::{EvidenceItem, OccurredAt},
};
use tracing::debug;

/// Token-set Jaccard similarity over lowercased alphanumeric tokens.
pub fn similarity(a: &str, b: &str) -> f64 {
  let tokens = |s: &str| -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
      .filter(|t| !t.is_empty())
      .map(|t| t.to_lowercase())
      .collect()
  };
  let ta = tokens(a);
  let tb = tokens(b);
  if ta.is_empty() && tb.is_empty() {
    return 1.0;
  }
  let intersection = ta.intersection(&tb).count();
  let union = ta.len() + tb.len() - intersection;
  if union == 0 { 1.0 } else { intersection as f64 / union as f64 }
}

fn is_duplicate(a: &EvidenceItem, b: &EvidenceItem, cfg: &DedupeConfig) -> bool {
  if a.id == b.id {
    return true;
  }
  if a.actors.is_disjoint(&b.actors) {
    return false;
  }
  if let (OccurredAt::Known(ta), OccurredAt::Known(tb)) =
    (a.occurred_at, b.occurred_at)
  {
    let gap = (ta - tb).num_seconds().abs();
    if gap > cfg.timestamp_tolerance_secs {
      return false;
    }
  }
  similarity(&a.raw_text, &b.raw_text) >= cfg.similarity_threshold
}

/// Rank of an adapter in the configured priority order; unlisted adapters
/// rank after all listed ones.
fn adapter_rank(adapter: &str, cfg: &DedupeConfig) -> usize {
  cfg
    .adapter_priority
    .iter()
    .position(|a| a == adapter)
    .unwrap_or(cfg.adapter_priority.len())
}

/// Fold `dup` into `survivor`: union of actors, earliest known timestamp
/// (ties broken by adapter priority), and the concatenated provenance list
/// so the chain of custody shows every contributing record.
fn merge(survivor: &mut EvidenceItem, dup: EvidenceItem, cfg: &DedupeConfig) {
  let survivor_ts = timestamp_with_rank(survivor, cfg);
  let dup_ts = timestamp_with_rank(&dup, cfg);
  if let Some((best, _rank)) = [survivor_ts, dup_ts].into_iter().flatten().min()
  {
    survivor.occurred_at = OccurredAt::Known(best);
  }

  survivor.actors.extend(dup.actors);
  for actor in &dup.declared_actors {
    if !survivor.declared_actors.contains(actor) {
      survivor.declared_actors.push(actor.clone());
    }
  }
  survivor.provenance.extend(dup.provenance);
  survivor.ingest_seq = survivor.ingest_seq.min(dup.ingest_seq);
}

/// `(timestamp, rank)` ordered so `min` picks the earliest timestamp, with
/// adapter priority breaking exact ties.
fn timestamp_with_rank(
  item: &EvidenceItem,
  cfg: &DedupeConfig,
) -> Option<(DateTime<Utc>, usize)> {
  let ts = item.occurred_at.known()?;
  let rank = item
    .provenance
    .first()
    .map(|p| adapter_rank(&p.adapter, cfg))
    .unwrap_or(usize::MAX);
  Some((ts, rank))
}

/// Deduplicate a normalised corpus. Preserves first-seen order among
/// survivors; `dedupe(dedupe(x)) == dedupe(x)`.
pub fn dedupe(
  items: Vec<EvidenceItem>,
  cfg: &DedupeConfig,
) -> Vec<EvidenceItem> {
  let mut survivors: Vec<EvidenceItem> = Vec::with_capacity(items.len());

  for item in items {
    match survivors.iter_mut().find(|s| is_duplicate(s, &item, cfg)) {
      Some(survivor) => {
        debug!(
          survivor = %survivor.id,
          merged = %item.id,
          "merged duplicate evidence"
        );
        merge(survivor, item, cfg);
      }
      None => survivors.push(item),
    }
  }

  // A merge can widen a survivor's actor set (or pull its timestamp
  // earlier) enough that two already-accepted survivors now match, so
  // collapse survivor pairs to a fixpoint. At termination no pair is a
  // duplicate, which is what makes a second pass a no-op.
  while let Some((keep, fold)) = duplicate_pair(&survivors, cfg) {
    let dup = survivors.remove(fold);
    debug!(
      survivor = %survivors[keep].id,
      merged = %dup.id,
      "merged converging survivors"
    );
    merge(&mut survivors[keep], dup, cfg);
  }

  survivors
}

/// First `(earlier, later)` survivor pair that has become a duplicate,
/// if any.
fn duplicate_pair(
  survivors: &[EvidenceItem],
  cfg: &DedupeConfig,
) -> Option<(usize, usize)> {
  for i in 0..survivors.len() {
    for j in i + 1..survivors.len() {
      if is_duplicate(&survivors[i], &survivors[j], cfg) {
        return Some((i, j));
      }
    }
  }
  None
}
