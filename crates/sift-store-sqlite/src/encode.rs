//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Actor lists are stored as
//! compact JSON. Evidence ids are stored as the full lowercase hex digest.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sift_core::{
  claim::VerificationState,
  evidence::{EvidenceId, EvidenceItem, OccurredAt, Provenance, SourceKind},
  oracle::VerificationResult,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

pub fn decode_source_kind(s: &str) -> Result<SourceKind> {
  SourceKind::parse(s).ok_or_else(|| Error::UnknownDiscriminant {
    column: "source_kind",
    value:  s.to_owned(),
  })
}

pub fn decode_state(s: &str) -> Result<VerificationState> {
  VerificationState::parse(s).ok_or_else(|| Error::UnknownDiscriminant {
    column: "state",
    value:  s.to_owned(),
  })
}

// ─── Actor lists ─────────────────────────────────────────────────────────────

pub fn encode_actor_set(actors: &BTreeSet<String>) -> Result<String> {
  let ordered: Vec<&String> = actors.iter().collect();
  Ok(serde_json::to_string(&ordered)?)
}

pub fn encode_actor_list(actors: &[String]) -> Result<String> {
  Ok(serde_json::to_string(actors)?)
}

pub fn decode_actor_set(s: &str) -> Result<BTreeSet<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn decode_actor_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `evidence` row.
pub struct RawEvidence {
  pub evidence_id:     String,
  pub source_kind:     String,
  pub occurred_at:     Option<String>,
  pub actors:          String,
  pub declared_actors: String,
  pub raw_text:        String,
  pub ingest_seq:      i64,
}

/// Raw strings read directly from a `provenance` row.
pub struct RawProvenance {
  pub adapter:     String,
  pub origin:      String,
  pub digest:      String,
  pub ingested_at: String,
}

impl RawProvenance {
  pub fn into_provenance(self) -> Result<Provenance> {
    Ok(Provenance {
      adapter:     self.adapter,
      origin:      self.origin,
      digest:      self.digest,
      ingested_at: decode_dt(&self.ingested_at)?,
    })
  }
}

impl RawEvidence {
  pub fn into_item(self, provenance: Vec<Provenance>) -> Result<EvidenceItem> {
    let occurred_at = match self.occurred_at {
      Some(s) => OccurredAt::Known(decode_dt(&s)?),
      None => OccurredAt::Unknown,
    };
    Ok(EvidenceItem {
      id: EvidenceId::from_hex(self.evidence_id),
      source_kind: decode_source_kind(&self.source_kind)?,
      occurred_at,
      actors: decode_actor_set(&self.actors)?,
      declared_actors: decode_actor_list(&self.declared_actors)?,
      raw_text: self.raw_text,
      provenance,
      ingest_seq: self.ingest_seq as u64,
    })
  }
}

/// Raw strings read directly from a `verification_cache` row.
pub struct RawVerification {
  pub claim_key:        String,
  pub state:            String,
  pub confidence_delta: f64,
  pub source_reference: Option<String>,
  pub verified_at:      String,
}

impl RawVerification {
  pub fn into_entry(self) -> Result<(String, VerificationResult)> {
    let result = VerificationResult {
      state:            decode_state(&self.state)?,
      confidence_delta: self.confidence_delta,
      source_reference: self.source_reference,
      verified_at:      decode_dt(&self.verified_at)?,
      // Anything read back from the store is by definition cached.
      from_cache:       true,
    };
    Ok((self.claim_key, result))
  }
}
