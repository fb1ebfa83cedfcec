//! Claim derivation.
//!
//! Turns the deduplicated corpus into verifiable triples. Two extractors
//! run here: actor co-occurrence yields `communicated_with` claims, and a
//! citation pattern over the text yields `referenced_citation` claims
//! (case citations like `[2023] VCAT 12` and statute names like
//! `Residential Tenancies Act 1997`). Richer behavioural extractors can
//! feed claims into the engine, but they live outside it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use sift_core::{claim::Claim, evidence::EvidenceId, evidence::EvidenceItem};

/// Case citations (`[2023] VCAT 12`) and statute references
/// (`Residential Tenancies Act 1997`).
static CITATION: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"\[\d{4}\]\s+[A-Z]{2,10}\s+\d+|\b(?:[A-Z][a-z]+\s+){1,6}Act\s+(?:19|20)\d{2}\b",
  )
  .expect("citation pattern compiles")
});

pub const COMMUNICATED_WITH: &str = "communicated_with";
pub const REFERENCED_CITATION: &str = "referenced_citation";

/// Derive claims from the corpus. Identical triples arising from several
/// items collapse into one claim carrying the union of their support.
pub fn derive(items: &[EvidenceItem]) -> Vec<Claim> {
  // (subject, predicate, object) -> supporting evidence ids.
  let mut support: BTreeMap<(String, String, String), BTreeSet<EvidenceId>> =
    BTreeMap::new();

  for item in items {
    let actors: Vec<&String> = item.actors.iter().collect();
    for (i, a) in actors.iter().enumerate() {
      for b in &actors[i + 1..] {
        support
          .entry((
            (*a).clone(),
            COMMUNICATED_WITH.to_string(),
            (*b).clone(),
          ))
          .or_default()
          .insert(item.id.clone());
      }
    }

    if let Some(speaker) = item.declared_actors.first() {
      for citation in CITATION.find_iter(&item.raw_text) {
        support
          .entry((
            speaker.clone(),
            REFERENCED_CITATION.to_string(),
            citation.as_str().to_string(),
          ))
          .or_default()
          .insert(item.id.clone());
      }
    }
  }

  support
    .into_iter()
    .filter_map(|((subject, predicate, object), evidence)| {
      // Entries are only created on insert, so support is never empty.
      Claim::new(subject, predicate, object, evidence).ok()
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::Utc;
  use sift_core::evidence::{
    OccurredAt, Provenance, SourceKind, canonicalize_text,
  };

  use super::*;

  fn item(declared: &[&str], body: &str, seq: u64) -> EvidenceItem {
    let text = canonicalize_text(body);
    let actors: BTreeSet<String> =
      declared.iter().map(|a| a.to_string()).collect();
    EvidenceItem {
      id:              EvidenceId::compute(SourceKind::Message, &actors, &text),
      source_kind:     SourceKind::Message,
      occurred_at:     OccurredAt::Unknown,
      actors,
      declared_actors: declared.iter().map(|a| a.to_string()).collect(),
      provenance:      vec![Provenance {
        adapter:     "mail-export".into(),
        origin:      format!("mbox:{seq}"),
        digest:      Provenance::digest_of(&text),
        ingested_at: Utc::now(),
      }],
      raw_text:        text,
      ingest_seq:      seq,
    }
  }

  #[test]
  fn co_occurrence_yields_communication_claims() {
    let claims = derive(&[item(&["alice", "bob"], "hello there bob", 0)]);
    assert!(claims.iter().any(|c| {
      c.predicate == COMMUNICATED_WITH
        && c.subject == "alice"
        && c.object == "bob"
    }));
  }

  #[test]
  fn repeated_pairs_collapse_into_one_corroborated_claim() {
    let claims = derive(&[
      item(&["alice", "bob"], "first exchange", 0),
      item(&["bob", "alice"], "second exchange", 1),
    ]);
    let comms: Vec<_> = claims
      .iter()
      .filter(|c| c.predicate == COMMUNICATED_WITH)
      .collect();
    assert_eq!(comms.len(), 1);
    assert_eq!(comms[0].support_count(), 2);
  }

  #[test]
  fn case_and_statute_citations_are_extracted() {
    let claims = derive(&[item(
      &["alice", "bob"],
      "Per [2023] VCAT 12, and see the Residential Tenancies Act 1997 \
       on repairs.",
      0,
    )]);
    let cited: Vec<&str> = claims
      .iter()
      .filter(|c| c.predicate == REFERENCED_CITATION)
      .map(|c| c.object.as_str())
      .collect();
    assert!(cited.contains(&"[2023] VCAT 12"));
    assert!(cited.contains(&"Residential Tenancies Act 1997"));
  }

  #[test]
  fn citation_claims_attribute_to_the_first_declared_actor() {
    let claims = derive(&[item(
      &["bob", "alice"],
      "I rely on [2021] HCA 4 here.",
      0,
    )]);
    let citation = claims
      .iter()
      .find(|c| c.predicate == REFERENCED_CITATION)
      .unwrap();
    assert_eq!(citation.subject, "bob");
  }

  #[test]
  fn plain_prose_yields_no_citation_claims() {
    let claims = derive(&[item(
      &["alice", "bob"],
      "Just confirming the meeting moved to three pm on Thursday.",
      0,
    )]);
    assert!(claims.iter().all(|c| c.predicate != REFERENCED_CITATION));
  }
}
