//! Synthesis — the final join of timeline, graph, and verification.
//!
//! Runs only after every claim for the batch has reached a terminal or
//! cached state; it is a synchronisation barrier, not a streaming consumer.
//! Conflicting claims are resolved by verification rank, then support
//! count; equal on both, all contenders are retained and the conflict is
//! recorded in the integrity summary. Silent conflict elision is
//! disallowed, and every claim considered lands in exactly one summary
//! bucket.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sift_core::{
  claim::{Claim, VerificationState},
  config::ConfidenceWeights,
  narrative::{
    IntegritySummary, Narrative, RelationshipEdge, TimelineEntry,
    UnresolvedConflict,
  },
  oracle::VerificationResult,
};
use tracing::info;

pub struct SynthesisInput {
  pub timeline: Vec<TimelineEntry>,
  pub edges:    Vec<RelationshipEdge>,
  pub claims:   Vec<Claim>,
  /// Verification results by canonical claim key; used to flag staleness.
  pub results:  HashMap<String, VerificationResult>,
  /// Carried through from earlier stages for the summary.
  pub quarantined:     usize,
  pub evidence_merged: usize,
  pub evidence_total:  usize,
}

/// Produce the final [`Narrative`]. `run_started` marks the beginning of
/// this run; cached verification results older than it count as stale.
pub fn synthesize(
  input: SynthesisInput,
  weights: &ConfidenceWeights,
  run_started: DateTime<Utc>,
) -> Narrative {
  let mut summary = IntegritySummary {
    quarantined:     input.quarantined,
    evidence_merged: input.evidence_merged,
    evidence_total:  input.evidence_total,
    ..IntegritySummary::default()
  };

  // Every claim considered is bucketed exactly once, winner or loser.
  let mut claims = input.claims;
  for claim in &mut claims {
    claim.recompute_confidence(weights);
    match claim.verification_state {
      VerificationState::Verified => summary.verified += 1,
      VerificationState::Rejected => summary.rejected += 1,
      VerificationState::Unverifiable => summary.unverifiable += 1,
      VerificationState::Unverified => summary.unverified += 1,
      VerificationState::Pending => summary.pending += 1,
    }
  }

  summary.stale_verifications = input
    .results
    .values()
    .filter(|r| r.from_cache && r.verified_at < run_started)
    .count();

  // Group by subject+predicate; resolve object disagreements.
  let mut groups: BTreeMap<(String, String), Vec<Claim>> = BTreeMap::new();
  for claim in claims {
    groups
      .entry((claim.subject.clone(), claim.predicate.clone()))
      .or_default()
      .push(claim);
  }

  let mut retained: Vec<Claim> = Vec::new();
  for ((subject, predicate), mut group) in groups {
    let objects: std::collections::BTreeSet<&str> =
      group.iter().map(|c| c.object.as_str()).collect();
    if objects.len() <= 1 {
      retained.append(&mut group);
      continue;
    }

    // Disagreement. Higher rank wins; then more support; a full tie keeps
    // every tied contender and records the conflict.
    group.sort_by(|a, b| {
      (b.verification_state.rank(), b.support_count(), &a.object).cmp(&(
        a.verification_state.rank(),
        a.support_count(),
        &b.object,
      ))
    });
    let top_rank = group[0].verification_state.rank();
    let top_support = group[0].support_count();
    let (winners, _losers): (Vec<Claim>, Vec<Claim>) =
      group.into_iter().partition(|c| {
        c.verification_state.rank() == top_rank
          && c.support_count() == top_support
      });

    if winners.len() > 1 {
      summary.conflicts.push(UnresolvedConflict {
        subject,
        predicate,
        objects: winners.iter().map(|c| c.object.clone()).collect(),
      });
    }
    retained.extend(winners);
  }

  info!(
    claims = summary.claims_total(),
    verified = summary.verified,
    unverifiable = summary.unverifiable,
    conflicts = summary.conflicts.len(),
    "synthesis complete"
  );

  Narrative {
    generated_at: Utc::now(),
    timeline: input.timeline,
    edges: input.edges,
    claims: retained,
    integrity_summary: summary,
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use sift_core::evidence::{EvidenceId, SourceKind};

  use super::*;

  fn support(n: usize, salt: &str) -> BTreeSet<EvidenceId> {
    (0..n)
      .map(|i| {
        EvidenceId::compute(
          SourceKind::Message,
          &std::iter::once(format!("{salt}{i}")).collect(),
          &format!("{salt} body {i}"),
        )
      })
      .collect()
  }

  fn claim(
    object: &str,
    state: VerificationState,
    support_count: usize,
  ) -> Claim {
    let mut c = Claim::new(
      "alice",
      "referenced_citation",
      object,
      support(support_count, object),
    )
    .unwrap();
    if state != VerificationState::Unverified {
      c.begin_verification().unwrap();
      if state != VerificationState::Pending {
        c.resolve(state).unwrap();
      }
    }
    c
  }

  fn run(claims: Vec<Claim>) -> Narrative {
    synthesize(
      SynthesisInput {
        timeline: Vec::new(),
        edges: Vec::new(),
        claims,
        results: HashMap::new(),
        quarantined: 0,
        evidence_merged: 0,
        evidence_total: 0,
      },
      &ConfidenceWeights::default(),
      Utc::now(),
    )
  }

  #[test]
  fn higher_verification_rank_wins_a_conflict() {
    let narrative = run(vec![
      claim("[2023] VCAT 12", VerificationState::Verified, 1),
      claim("[2023] VCAT 99", VerificationState::Rejected, 5),
    ]);
    assert_eq!(narrative.claims.len(), 1);
    assert_eq!(narrative.claims[0].object, "[2023] VCAT 12");
    assert!(narrative.integrity_summary.conflicts.is_empty());
    // The loser still shows up in its bucket.
    assert_eq!(narrative.integrity_summary.rejected, 1);
    assert_eq!(narrative.integrity_summary.verified, 1);
  }

  #[test]
  fn equal_rank_falls_back_to_support_count() {
    let narrative = run(vec![
      claim("[2023] VCAT 12", VerificationState::Unverifiable, 1),
      claim("[2023] VCAT 99", VerificationState::Unverifiable, 3),
    ]);
    assert_eq!(narrative.claims.len(), 1);
    assert_eq!(narrative.claims[0].object, "[2023] VCAT 99");
  }

  #[test]
  fn full_tie_retains_both_and_records_the_conflict() {
    let narrative = run(vec![
      claim("[2023] VCAT 12", VerificationState::Unverifiable, 2),
      claim("[2023] VCAT 99", VerificationState::Unverifiable, 2),
    ]);
    assert_eq!(narrative.claims.len(), 2);
    assert_eq!(narrative.integrity_summary.conflicts.len(), 1);
    let conflict = &narrative.integrity_summary.conflicts[0];
    assert_eq!(conflict.objects.len(), 2);
  }

  #[test]
  fn every_claim_lands_in_exactly_one_bucket() {
    let narrative = run(vec![
      claim("[2020] VSC 1", VerificationState::Verified, 1),
      claim("[2020] VSC 2", VerificationState::Rejected, 1),
      claim("[2020] VSC 3", VerificationState::Unverifiable, 1),
    ]);
    assert_eq!(narrative.integrity_summary.claims_total(), 3);
  }

  #[test]
  fn confidence_is_recomputed_at_synthesis() {
    let narrative =
      run(vec![claim("[2020] VSC 1", VerificationState::Verified, 3)]);
    let c = &narrative.claims[0];
    assert!(c.confidence >= 0.9);
    assert!(c.confidence <= 1.0);
  }

  #[test]
  fn agreeing_claims_do_not_conflict() {
    let narrative = run(vec![
      claim("[2020] VSC 1", VerificationState::Verified, 1),
    ]);
    assert!(narrative.integrity_summary.conflicts.is_empty());
    assert_eq!(narrative.claims.len(), 1);
  }
}
