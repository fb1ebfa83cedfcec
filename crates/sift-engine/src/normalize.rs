//! Evidence normalisation.
//!
//! Converts heterogeneous adapter records into canonical [`EvidenceItem`]s.
//! Deterministic: identical input bytes and kind always yield the same id.
//! Records missing the required fields fail with `MalformedSource`, which
//! the pipeline quarantines without aborting the corpus.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use sift_core::{
  Error, Result,
  evidence::{
    EvidenceId, EvidenceItem, OccurredAt, Provenance, SourceRecord,
    canonicalize_text, normalize_actor,
  },
};

/// Normalise a single source record. `ingest_seq` is the record's position
/// in the ingestion sequence; `ingested_at` is stamped into provenance (and
/// deliberately excluded from the content fingerprint).
pub fn normalize(
  record: &SourceRecord,
  ingest_seq: u64,
  ingested_at: DateTime<Utc>,
) -> Result<EvidenceItem> {
  let canonical = canonicalize_text(&record.body);
  if canonical.is_empty() {
    return Err(Error::MalformedSource {
      origin: record.origin.clone(),
      reason: "empty text payload".into(),
    });
  }

  let declared_actors: Vec<String> = record
    .declared_actors
    .iter()
    .map(|a| normalize_actor(a))
    .filter(|a| !a.is_empty())
    .collect();
  let actors: BTreeSet<String> = declared_actors.iter().cloned().collect();
  if actors.is_empty() {
    return Err(Error::MalformedSource {
      origin: record.origin.clone(),
      reason: "no actors could be extracted".into(),
    });
  }

  let occurred_at = match record.declared_timestamp {
    Some(ts) => OccurredAt::Known(ts),
    None => OccurredAt::Unknown,
  };

  let id = EvidenceId::compute(record.source_kind, &actors, &canonical);
  let digest = Provenance::digest_of(&canonical);

  Ok(EvidenceItem {
    id,
    source_kind: record.source_kind,
    occurred_at,
    actors,
    declared_actors,
    raw_text: canonical,
    provenance: vec![Provenance {
      adapter: record.adapter.clone(),
      origin: record.origin.clone(),
      digest,
      ingested_at,
    }],
    ingest_seq,
  })
}

/// Normalise a whole batch in parallel. Normalisation is CPU-bound and
/// embarrassingly parallel; results are write-once and merged at the join.
/// Returns survivors in ingestion order plus the quarantined failures.
pub fn normalize_all(
  records: &[SourceRecord],
  ingested_at: DateTime<Utc>,
) -> (Vec<EvidenceItem>, Vec<(String, Error)>) {
  let results: Vec<Result<EvidenceItem>> = records
    .par_iter()
    .enumerate()
    .map(|(seq, record)| normalize(record, seq as u64, ingested_at))
    .collect();

  let mut items = Vec::with_capacity(records.len());
  let mut quarantined = Vec::new();
  for (record, result) in records.iter().zip(results) {
    match result {
      Ok(item) => items.push(item),
      Err(e) => quarantined.push((record.origin.clone(), e)),
    }
  }
  (items, quarantined)
}
