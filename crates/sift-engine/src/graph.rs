//! Relationship graph construction.
//!
//! For every pair of actors co-occurring in one evidence item there is at
//! most one edge, keyed by the unordered pair and mutated in place as
//! evidence arrives. Weight is updated incrementally — never recomputed
//! from scratch — so the builder works as well on a stream as on a batch.
//! The edge map is a `DashMap`: updates to a single edge are atomic
//! read-modify-writes, updates to different edges proceed independently.

use dashmap::DashMap;
use sift_core::{
  config::GraphConfig,
  evidence::{EvidenceItem, SourceKind},
  narrative::RelationshipEdge,
};

pub struct RelationshipGraph {
  edges:  DashMap<(String, String), RelationshipEdge>,
  config: GraphConfig,
}

impl RelationshipGraph {
  pub fn new(config: GraphConfig) -> Self {
    Self {
      edges: DashMap::new(),
      config,
    }
  }

  /// Record one evidence item. Safe to call concurrently from the
  /// ingestion workers; per-edge state is only touched under the map's
  /// entry lock.
  pub fn record(&self, item: &EvidenceItem) {
    let occurred = item.occurred_at.known();
    let initiator = item.declared_actors.first().cloned();
    let step = match item.source_kind {
      SourceKind::Document => self.config.document_weight,
      _ => self.config.message_weight,
    };

    let actors: Vec<&String> = item.actors.iter().collect();
    for (i, a) in actors.iter().enumerate() {
      for b in &actors[i + 1..] {
        let key = ((*a).clone(), (*b).clone());
        let mut edge = self
          .edges
          .entry(key.clone())
          .or_insert_with(|| RelationshipEdge::new(key.0, key.1));

        edge.interaction_count += 1;
        let mut increment = step;
        if let Some(ts) = occurred {
          if let Some(last) = edge.last_seen {
            let gap = (ts - last).num_seconds().abs();
            if gap <= self.config.recency_window_secs {
              increment += self.config.recency_bonus;
            }
          }
          edge.first_seen = Some(match edge.first_seen {
            Some(first) => first.min(ts),
            None => ts,
          });
          edge.last_seen = Some(match edge.last_seen {
            Some(last) => last.max(ts),
            None => ts,
          });
        }
        edge.weight += increment;

        if let Some(init) = &initiator {
          if init == &edge.actor_a {
            edge.initiations_a += 1;
          } else if init == &edge.actor_b {
            edge.initiations_b += 1;
          }
        }
      }
    }
  }

  /// Batch form: record everything, then snapshot.
  pub fn build(items: &[EvidenceItem], config: GraphConfig) -> Vec<RelationshipEdge> {
    let graph = Self::new(config);
    for item in items {
      graph.record(item);
    }
    graph.into_edges()
  }

  /// Snapshot the edge set in deterministic (actor_a, actor_b) order.
  pub fn into_edges(self) -> Vec<RelationshipEdge> {
    let mut edges: Vec<RelationshipEdge> =
      self.edges.into_iter().map(|(_, edge)| edge).collect();
    edges.sort_by(|x, y| {
      (&x.actor_a, &x.actor_b).cmp(&(&y.actor_a, &y.actor_b))
    });
    edges
  }

  pub fn edge_count(&self) -> usize { self.edges.len() }
}
