//! Timeline reconstruction.
//!
//! Produces a strict total order over the deduplicated corpus. Known
//! timestamps sort first-class. Items with unknown timestamps are placed by
//! causal inference when their text quotes a known-timestamp item (a reply
//! carrying the original's lines), and by ingestion sequence otherwise.
//! The final tiebreak is id lexical order, so the same corpus always yields
//! the same timeline.

use sift_core::{
  config::TimelineConfig,
  evidence::{EvidenceItem, OccurredAt},
  narrative::{OrderingBasis, TimelineEntry},
};
use tracing::debug;

/// Does `child`'s text quote a line of `parent`'s? A line only counts once
/// it is long enough that coincidental overlap is implausible.
fn references(child: &EvidenceItem, parent: &EvidenceItem, min_len: usize) -> bool {
  if child.id == parent.id {
    return false;
  }
  parent
    .raw_text
    .lines()
    .map(str::trim)
    .filter(|line| line.len() >= min_len)
    .any(|line| child.raw_text.contains(line))
}

/// Build the timeline. Returns one entry per input item (a permutation of
/// the corpus) with strictly increasing `order_key`.
pub fn build(items: &[EvidenceItem], cfg: &TimelineConfig) -> Vec<TimelineEntry> {
  // Known-timestamp items in (timestamp, id) order.
  let mut known: Vec<&EvidenceItem> = items
    .iter()
    .filter(|i| i.occurred_at.is_known())
    .collect();
  known.sort_by(|a, b| {
    (a.occurred_at.known(), &a.id).cmp(&(b.occurred_at.known(), &b.id))
  });

  // For each unknown-timestamp item, find its causal parent: the latest
  // known item whose text it quotes (ties by id).
  let mut unplaced: Vec<&EvidenceItem> = Vec::new();
  let mut children: Vec<(usize, &EvidenceItem)> = Vec::new();
  for item in items.iter().filter(|i| !i.occurred_at.is_known()) {
    let parent = known
      .iter()
      .enumerate()
      .filter(|(_, k)| references(item, k, cfg.min_reference_len))
      .max_by_key(|(_, k)| (k.occurred_at.known(), k.id.clone()));
    match parent {
      Some((idx, parent)) => {
        debug!(child = %item.id, parent = %parent.id, "causal placement");
        children.push((idx, item));
      }
      None => unplaced.push(item),
    }
  }
  // Children of one parent order deterministically by id.
  children.sort_by(|a, b| (a.0, &a.1.id).cmp(&(b.0, &b.1.id)));

  // Last-resort fallback: ingestion sequence, then id. Stable between runs.
  unplaced.sort_by(|a, b| (a.ingest_seq, &a.id).cmp(&(b.ingest_seq, &b.id)));

  // Weave: each known item, then its causal children, then the fallbacks.
  let mut ordered: Vec<(&EvidenceItem, OrderingBasis)> =
    Vec::with_capacity(items.len());
  let mut child_iter = children.into_iter().peekable();
  for (idx, item) in known.iter().enumerate() {
    ordered.push((item, OrderingBasis::KnownTimestamp));
    while let Some((_, child)) = child_iter.next_if(|(p, _)| *p == idx) {
      ordered.push((child, OrderingBasis::CausalInference));
    }
  }
  for item in unplaced {
    ordered.push((item, OrderingBasis::IngestionOrder));
  }

  ordered
    .into_iter()
    .enumerate()
    .map(|(position, (item, basis))| TimelineEntry {
      evidence_id:         item.id.clone(),
      order_key:           position as u64,
      ordering_confidence: match basis {
        OrderingBasis::KnownTimestamp => 1.0,
        OrderingBasis::CausalInference => cfg.causal_confidence,
        OrderingBasis::IngestionOrder => cfg.fallback_confidence,
      },
      basis,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::collections::{BTreeSet, HashSet};

  use chrono::{DateTime, Duration, Utc};
  use sift_core::evidence::{
    EvidenceId, Provenance, SourceKind, canonicalize_text,
  };

  use super::*;

  fn item(
    body: &str,
    ts: Option<DateTime<Utc>>,
    seq: u64,
  ) -> EvidenceItem {
    let text = canonicalize_text(body);
    let actors: BTreeSet<String> =
      ["alice@example.com".to_string(), "bob@example.com".to_string()]
        .into_iter()
        .collect();
    EvidenceItem {
      id:              EvidenceId::compute(SourceKind::Message, &actors, &text),
      source_kind:     SourceKind::Message,
      occurred_at:     ts.map(OccurredAt::Known).unwrap_or(OccurredAt::Unknown),
      actors,
      declared_actors: vec![
        "alice@example.com".into(),
        "bob@example.com".into(),
      ],
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
  fn produces_a_strict_total_order_over_all_items() {
    let base = Utc::now();
    let items = vec![
      item("message one with a timestamp", Some(base), 0),
      item("message two, no timestamp, unrelated text", None, 1),
      item("message three with a timestamp", Some(base - Duration::hours(1)), 2),
      item("message four, also undated and unrelated", None, 3),
    ];
    let timeline = build(&items, &TimelineConfig::default());

    assert_eq!(timeline.len(), items.len());
    let keys: HashSet<u64> = timeline.iter().map(|e| e.order_key).collect();
    assert_eq!(keys.len(), items.len());
    let ids: HashSet<_> = timeline.iter().map(|e| &e.evidence_id).collect();
    assert_eq!(ids.len(), items.len());
  }

  #[test]
  fn known_timestamps_sort_chronologically() {
    let base = Utc::now();
    let items = vec![
      item("latest of the three messages here", Some(base), 0),
      item("earliest of the three messages here", Some(base - Duration::days(2)), 1),
      item("middle of the three messages here", Some(base - Duration::days(1)), 2),
    ];
    let timeline = build(&items, &TimelineConfig::default());
    assert_eq!(timeline[0].evidence_id, items[1].id);
    assert_eq!(timeline[1].evidence_id, items[2].id);
    assert_eq!(timeline[2].evidence_id, items[0].id);
    assert!(timeline.iter().all(|e| e.ordering_confidence == 1.0));
  }

  #[test]
  fn quoted_reply_lands_right_after_its_parent() {
    let base = Utc::now();
    let original = item(
      "The tribunal hearing has been rescheduled to Friday 14 June at 10am.",
      Some(base - Duration::days(1)),
      0,
    );
    let later = item("a later, unrelated known message", Some(base), 1);
    let reply = item(
      "Understood, I will be there.\n\
       The tribunal hearing has been rescheduled to Friday 14 June at 10am.",
      None,
      2,
    );

    let cfg = TimelineConfig::default();
    let timeline = build(&[original.clone(), later.clone(), reply.clone()], &cfg);

    let pos = |id: &EvidenceId| {
      timeline.iter().position(|e| &e.evidence_id == id).unwrap()
    };
    assert_eq!(pos(&reply.id), pos(&original.id) + 1);
    assert!(pos(&reply.id) < pos(&later.id));

    let entry = &timeline[pos(&reply.id)];
    assert_eq!(entry.basis, OrderingBasis::CausalInference);
    assert!(entry.ordering_confidence < 1.0);
    assert!(entry.ordering_confidence > cfg.fallback_confidence);
  }

  #[test]
  fn undated_unreferenced_items_fall_back_to_ingestion_order() {
    let items = vec![
      item("completely undated message alpha", None, 5),
      item("completely undated message beta", None, 2),
    ];
    let cfg = TimelineConfig::default();
    let timeline = build(&items, &cfg);

    assert_eq!(timeline[0].evidence_id, items[1].id);
    assert_eq!(timeline[1].evidence_id, items[0].id);
    assert!(
      timeline
        .iter()
        .all(|e| e.ordering_confidence == cfg.fallback_confidence)
    );
  }

  #[test]
  fn same_corpus_always_yields_the_same_timeline() {
    let base = Utc::now();
    let items = vec![
      item("dated message body number one", Some(base), 0),
      item("undated message body number two", None, 1),
      item("dated message body number three", Some(base), 2),
    ];
    let cfg = TimelineConfig::default();
    let a = build(&items, &cfg);
    let b = build(&items, &cfg);
    assert_eq!(a, b);
  }
}
