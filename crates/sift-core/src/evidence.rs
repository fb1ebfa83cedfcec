//! Evidence types — the fundamental unit of the Sift corpus.
//!
//! An evidence item is an immutable, normalised record of something a source
//! adapter delivered: a message, a document, a monitored-feed entry, or an
//! external lookup result. Its identity is a content fingerprint, computed
//! once at ingestion and never regenerated. Two items with the same id are
//! the same evidence and must be merged, never duplicated.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Source kinds ────────────────────────────────────────────────────────────

/// Where a piece of evidence came from, at the adapter-contract level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  Message,
  Document,
  FeedEntry,
  ExternalLookup,
}

impl SourceKind {
  /// The discriminant string stored in the `source_kind` column.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Message => "message",
      Self::Document => "document",
      Self::FeedEntry => "feed_entry",
      Self::ExternalLookup => "external_lookup",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "message" => Some(Self::Message),
      "document" => Some(Self::Document),
      "feed_entry" => Some(Self::FeedEntry),
      "external_lookup" => Some(Self::ExternalLookup),
      _ => None,
    }
  }
}

// ─── Temporal ────────────────────────────────────────────────────────────────

/// When a piece of evidence occurred in the real world.
///
/// `Unknown` is an explicit state, not an absent value — downstream ordering
/// logic must treat it distinctly from "equal to epoch".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OccurredAt {
  Known(DateTime<Utc>),
  Unknown,
}

impl OccurredAt {
  pub fn known(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Known(dt) => Some(*dt),
      Self::Unknown => None,
    }
  }

  pub fn is_known(&self) -> bool { matches!(self, Self::Known(_)) }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Stable content fingerprint of an evidence item.
///
/// SHA-256 over the canonicalised body, the source kind, and the sorted actor
/// set. Deterministic: identical input bytes and kind always yield the same
/// id. Never regenerated after creation.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EvidenceId(String);

impl EvidenceId {
  pub fn compute(
    kind: SourceKind,
    actors: &BTreeSet<String>,
    canonical_text: &str,
  ) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    for actor in actors {
      hasher.update(actor.as_bytes());
      hasher.update([0u8]);
    }
    hasher.update(canonical_text.as_bytes());
    Self(hex::encode(hasher.finalize()))
  }

  /// Wrap an already-computed fingerprint (e.g. read back from storage).
  pub fn from_hex(s: impl Into<String>) -> Self { Self(s.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for EvidenceId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // The full digest is unwieldy in logs; show a prefix. `from_hex` does
    // not validate its input, so take chars rather than byte-slicing.
    let prefix: String = self.0.chars().take(12).collect();
    f.write_str(&prefix)
  }
}

// ─── Canonicalisation ────────────────────────────────────────────────────────

/// Collapse runs of whitespace and trim each line. Used both for fingerprint
/// input and for text similarity, so that forwarding banners and re-wrapped
/// quotes don't change identity-relevant content more than they must.
pub fn canonicalize_text(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for line in raw.lines() {
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    if !out.is_empty() {
      out.push('\n');
    }
    let mut last_space = false;
    for c in trimmed.chars() {
      if c.is_whitespace() {
        if !last_space {
          out.push(' ');
        }
        last_space = true;
      } else {
        out.push(c);
        last_space = false;
      }
    }
  }
  out
}

/// Normalise an actor identifier: lowercase, trimmed.
pub fn normalize_actor(raw: &str) -> String { raw.trim().to_lowercase() }

// ─── Provenance ──────────────────────────────────────────────────────────────

/// One link of the chain of custody: which adapter produced the record, from
/// what source identifier, with an integrity digest computed at ingestion
/// time and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
  /// Name of the adapter that delivered the record (e.g. "mail-export").
  pub adapter:     String,
  /// Source file or identifier within that adapter.
  pub origin:      String,
  /// SHA-256 hex digest of the canonical text at ingestion time.
  pub digest:      String,
  pub ingested_at: DateTime<Utc>,
}

impl Provenance {
  pub fn digest_of(canonical_text: &str) -> String {
    hex::encode(Sha256::digest(canonical_text.as_bytes()))
  }
}

// ─── Source record ───────────────────────────────────────────────────────────

/// The adapter-facing input contract. The core never parses source-specific
/// binary formats; adapters deliver records in this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
  pub source_kind:        SourceKind,
  /// Raw text payload (adapters handle any binary extraction).
  pub body:               String,
  /// Best-effort timestamp declared by the adapter; `None` means unknown.
  pub declared_timestamp: Option<DateTime<Utc>>,
  /// Actors involved, in adapter order. For messages the first entry is the
  /// sender by convention.
  pub declared_actors:    Vec<String>,
  /// Source file or identifier within the adapter.
  pub origin:             String,
  /// Adapter name, used for provenance and merge-priority ordering.
  pub adapter:            String,
}

// ─── Evidence item ───────────────────────────────────────────────────────────

/// The atomic unit of evidence. Owned by the corpus; derived structures
/// (claims, timeline entries, edges) reference it only by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
  pub id:          EvidenceId,
  pub source_kind: SourceKind,
  pub occurred_at: OccurredAt,
  /// Normalised actor identifiers mentioned or involved.
  pub actors:      BTreeSet<String>,
  /// Actor order as declared by the adapter; index 0 is the initiator for
  /// message-like records.
  pub declared_actors: Vec<String>,
  /// Canonicalised text payload used for claim extraction.
  pub raw_text:    String,
  /// Chain of custody. The first entry is the surviving source record; a
  /// merged duplicate appends its own entry with its own digest.
  pub provenance:  Vec<Provenance>,
  /// Position in the ingestion sequence; the deterministic last-resort
  /// ordering key for items with unknown timestamps.
  pub ingest_seq:  u64,
}

impl EvidenceItem {
  /// Verify the chain-of-custody digest of the surviving source record
  /// against the current text. A mismatch is a fatal integrity error for
  /// this item, never a silent skip.
  pub fn verify_integrity(&self) -> Result<()> {
    let Some(first) = self.provenance.first() else {
      return Err(Error::IntegrityViolation {
        id:       self.id.clone(),
        expected: "<provenance entry>".into(),
        actual:   "<missing>".into(),
      });
    };
    let actual = Provenance::digest_of(&self.raw_text);
    if actual != first.digest {
      return Err(Error::IntegrityViolation {
        id:       self.id.clone(),
        expected: first.digest.clone(),
        actual,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn actors(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn canonicalize_collapses_whitespace_and_blank_lines() {
    let raw = "  Hello   world \n\n\t quoted\tline \n";
    assert_eq!(canonicalize_text(raw), "Hello world\nquoted line");
  }

  #[test]
  fn id_is_deterministic() {
    let a = actors(&["alice@example.com", "bob@example.com"]);
    let one = EvidenceId::compute(SourceKind::Message, &a, "body text");
    let two = EvidenceId::compute(SourceKind::Message, &a, "body text");
    assert_eq!(one, two);
  }

  #[test]
  fn id_changes_with_kind_and_text() {
    let a = actors(&["alice@example.com"]);
    let msg = EvidenceId::compute(SourceKind::Message, &a, "body");
    let doc = EvidenceId::compute(SourceKind::Document, &a, "body");
    let other = EvidenceId::compute(SourceKind::Message, &a, "other body");
    assert_ne!(msg, doc);
    assert_ne!(msg, other);
  }

  #[test]
  fn display_truncates_ids_with_multibyte_content() {
    // `from_hex` accepts whatever the store hands back; a corrupted row
    // with a multi-byte char straddling the prefix must still log.
    let corrupted = EvidenceId::from_hex("abcdefabcdeé123456789");
    assert_eq!(corrupted.to_string(), "abcdefabcdeé");
    let short = EvidenceId::from_hex("ab");
    assert_eq!(short.to_string(), "ab");
  }

  #[test]
  fn integrity_check_passes_then_fails_on_tamper() {
    let text = canonicalize_text("original body");
    let a = actors(&["alice@example.com"]);
    let mut item = EvidenceItem {
      id:              EvidenceId::compute(SourceKind::Message, &a, &text),
      source_kind:     SourceKind::Message,
      occurred_at:     OccurredAt::Unknown,
      actors:          a,
      declared_actors: vec!["alice@example.com".into()],
      raw_text:        text.clone(),
      provenance:      vec![Provenance {
        adapter:     "test".into(),
        origin:      "mbox:1".into(),
        digest:      Provenance::digest_of(&text),
        ingested_at: Utc::now(),
      }],
      ingest_seq:      0,
    };
    assert!(item.verify_integrity().is_ok());

    item.raw_text = "tampered body".into();
    let err = item.verify_integrity().unwrap_err();
    assert!(matches!(err, Error::IntegrityViolation { .. }));
  }
}
