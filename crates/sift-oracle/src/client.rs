//! [`Verifier`] — the verification oracle client.
//!
//! One `verify` call per claim drives the whole failure-handling policy:
//! cache short-circuit, per-claim coalescing, semaphore admission against
//! the external sources, per-call timeouts, bounded exponential backoff on
//! transient failures, and cancellation that interrupts backoff sleeps.
//! Exhaustion resolves to `Unverifiable` — absence of evidence is not
//! evidence of absence, and it is never surfaced as an error.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use sift_core::{
  claim::{Claim, VerificationState},
  config::VerifyConfig,
  oracle::{Authority, LookupError, LookupOutcome, LookupQuery, VerificationResult},
};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Result, cache::VerificationCache};

// ─── Verifier ────────────────────────────────────────────────────────────────

pub struct Verifier {
  authorities: Vec<Arc<dyn Authority>>,
  cache:       VerificationCache,
  /// Admission control: bounds concurrent in-flight external calls.
  permits:     Arc<Semaphore>,
  /// Per-claim mutual exclusion. A second caller for an in-flight claim
  /// parks on the key's mutex and finds the first caller's result in the
  /// cache rather than issuing a duplicate call.
  in_flight:   DashMap<String, Arc<Mutex<()>>>,
  config:      VerifyConfig,
}

impl Verifier {
  pub fn new(
    authorities: Vec<Arc<dyn Authority>>,
    config: VerifyConfig,
  ) -> Self {
    let cache = VerificationCache::new(config.cache_ttl_secs);
    let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    Self {
      authorities,
      cache,
      permits,
      in_flight: DashMap::new(),
      config,
    }
  }

  /// The underlying cache, for warming from and exporting to a store.
  pub fn cache(&self) -> &VerificationCache { &self.cache }

  /// Verify one claim against the configured authorities.
  ///
  /// Returns the terminal [`VerificationResult`] for this run. The only
  /// error surface is cancellation; every oracle-side failure mode folds
  /// into the result's state.
  pub async fn verify(
    &self,
    claim: &Claim,
    cancel: &CancellationToken,
  ) -> Result<VerificationResult> {
    let key = claim.canonical_key();

    if let Some(hit) = self.cache.get(&key) {
      debug!(claim = %key, "verification served from cache");
      return Ok(hit);
    }

    let gate = self
      .in_flight
      .entry(key.clone())
      .or_insert_with(|| Arc::new(Mutex::new(())))
      .clone();
    let _guard = gate.lock().await;

    // A coalesced caller wakes up here after the first caller finished.
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }

    let query = LookupQuery::from_claim(claim);
    let result = self.consult_authorities(&query, cancel).await;

    // Drop the coalescing entry on the error path too; a cancelled first
    // caller must not leave its gate keyed in the map forever.
    self.in_flight.remove(&key);

    let result = result?;
    self.cache.put(key, result.clone());
    Ok(result)
  }

  /// Ask each authority in order; the first definitive answer (match above
  /// the floor, or explicit contradiction) wins. Authorities that fail or
  /// answer inconclusively fall through to the next.
  async fn consult_authorities(
    &self,
    query: &LookupQuery,
    cancel: &CancellationToken,
  ) -> Result<VerificationResult> {
    for authority in &self.authorities {
      match self.consult_one(authority.as_ref(), query, cancel).await? {
        Some(outcome) if outcome.contradicted => {
          return Ok(VerificationResult {
            state:            VerificationState::Rejected,
            confidence_delta: -outcome.confidence,
            source_reference: reference(authority.name(), &outcome),
            verified_at:      Utc::now(),
            from_cache:       false,
          });
        }
        Some(outcome)
          if outcome.matched
            && outcome.confidence >= self.config.verified_floor =>
        {
          return Ok(VerificationResult {
            state:            VerificationState::Verified,
            confidence_delta: outcome.confidence,
            source_reference: reference(authority.name(), &outcome),
            verified_at:      Utc::now(),
            from_cache:       false,
          });
        }
        Some(outcome) => {
          // Definitive but inconclusive: no match, or a match below the
          // configured floor. Try the next authority.
          debug!(
            authority = authority.name(),
            claim = %query.canonical,
            matched = outcome.matched,
            confidence = outcome.confidence,
            "inconclusive lookup"
          );
        }
        None => {
          // Retries exhausted against this authority.
          warn!(
            authority = authority.name(),
            claim = %query.canonical,
            "authority exhausted without a definitive answer"
          );
        }
      }
    }

    Ok(VerificationResult {
      state:            VerificationState::Unverifiable,
      confidence_delta: 0.0,
      source_reference: None,
      verified_at:      Utc::now(),
      from_cache:       false,
    })
  }

  /// One bounded-retry conversation with a single authority. `Ok(None)`
  /// means the attempt budget ran out without a definitive answer.
  async fn consult_one(
    &self,
    authority: &dyn Authority,
    query: &LookupQuery,
    cancel: &CancellationToken,
  ) -> Result<Option<LookupOutcome>> {
    let call_timeout = Duration::from_millis(self.config.call_timeout_ms);

    for attempt in 1..=self.config.max_attempts {
      if cancel.is_cancelled() {
        return Err(Error::Cancelled);
      }

      // Permit is taken per call, not per retry loop, so a backoff sleep
      // never holds an admission slot.
      let permit = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        permit = self.permits.clone().acquire_owned() => match permit {
          Ok(p) => p,
          // The semaphore only closes when the verifier is being torn down.
          Err(_) => return Err(Error::Cancelled),
        }
      };

      let call = tokio::time::timeout(call_timeout, authority.lookup(query));
      let outcome = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        result = call => match result {
          Ok(inner) => inner,
          Err(_elapsed) => Err(LookupError::Timeout),
        },
      };
      drop(permit);

      match outcome {
        Ok(answer) => return Ok(Some(answer)),
        Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
          let delay = self.backoff_delay(attempt);
          debug!(
            authority = authority.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "transient lookup failure; backing off"
          );
          tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
          }
        }
        Err(e) => {
          warn!(
            authority = authority.name(),
            attempt,
            error = %e,
            "lookup failed"
          );
          return Ok(None);
        }
      }
    }

    Ok(None)
  }

  /// Exponential backoff with up-to-half jitter: base * 2^(attempt-1).
  fn backoff_delay(&self, attempt: u32) -> Duration {
    let exponent = (attempt.saturating_sub(1)).min(16);
    let base = self.config.backoff_base_ms.saturating_mul(1u64 << exponent);
    let jitter = rand::thread_rng().gen_range(0..=base / 2 + 1);
    Duration::from_millis(base + jitter)
  }
}

fn reference(authority: &str, outcome: &LookupOutcome) -> Option<String> {
  outcome
    .reference_id
    .as_ref()
    .map(|id| format!("{authority}:{id}"))
}

#[cfg(test)]
mod tests {
  use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use async_trait::async_trait;
  use sift_core::evidence::{EvidenceId, SourceKind};

  use super::*;
  use crate::authority::{ScriptedAuthority, ScriptedStep};

  fn claim(subject: &str, object: &str) -> Claim {
    let support: BTreeSet<EvidenceId> = std::iter::once(EvidenceId::compute(
      SourceKind::Message,
      &std::iter::once(subject.to_string()).collect(),
      "supporting body",
    ))
    .collect();
    Claim::new(subject, "referenced_citation", object, support).unwrap()
  }

  fn config(max_attempts: u32) -> VerifyConfig {
    VerifyConfig {
      max_attempts,
      backoff_base_ms: 1,
      call_timeout_ms: 2_000,
      ..VerifyConfig::default()
    }
  }

  #[tokio::test]
  async fn positive_match_above_floor_verifies() {
    let authority =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.95, "case-1"));
    let verifier = Verifier::new(vec![authority], config(3));

    let result = verifier
      .verify(&claim("alice", "[2023] VCAT 12"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Verified);
    assert!(result.confidence_delta >= 0.9);
    assert_eq!(result.source_reference.as_deref(), Some("austlii:case-1"));
    assert!(!result.from_cache);
  }

  #[tokio::test]
  async fn match_below_floor_does_not_verify() {
    let authority =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.5, "case-1"));
    let verifier = Verifier::new(vec![authority], config(3));

    let result = verifier
      .verify(&claim("alice", "[2023] VCAT 12"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Unverifiable);
  }

  #[tokio::test]
  async fn contradiction_rejects() {
    let authority = Arc::new(ScriptedAuthority::always_contradict("register"));
    let verifier = Verifier::new(vec![authority], config(3));

    let result = verifier
      .verify(&claim("alice", "Fictional Act 1901"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Rejected);
    assert!(result.confidence_delta < 0.0);
  }

  #[tokio::test]
  async fn second_verify_within_ttl_hits_cache_without_a_call() {
    let authority =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.95, "case-1"));
    let verifier = Verifier::new(vec![authority.clone()], config(3));
    let c = claim("alice", "[2023] VCAT 12");
    let cancel = CancellationToken::new();

    let first = verifier.verify(&c, &cancel).await.unwrap();
    let second = verifier.verify(&c, &cancel).await.unwrap();

    assert_eq!(authority.calls(), 1);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.state, second.state);
    assert_eq!(first.verified_at, second.verified_at);
  }

  #[tokio::test]
  async fn three_transient_failures_end_unverifiable() {
    let authority = Arc::new(ScriptedAuthority::never_match("flaky"));
    authority.push_steps(vec![
      ScriptedStep::Transient("timeout".into()),
      ScriptedStep::Transient("rate limit".into()),
      ScriptedStep::Transient("timeout".into()),
    ]);
    let verifier = Verifier::new(vec![authority.clone()], config(3));

    let result = verifier
      .verify(&claim("alice", "[2023] VCAT 99"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Unverifiable);
    assert_eq!(authority.calls(), 3);
  }

  #[tokio::test]
  async fn transient_failures_then_success_retries_through() {
    let authority =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.9, "case-2"));
    authority.push_steps(vec![ScriptedStep::Transient("blip".into())]);
    let verifier = Verifier::new(vec![authority.clone()], config(3));

    let result = verifier
      .verify(&claim("bob", "[2022] FCA 7"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Verified);
    assert_eq!(authority.calls(), 2);
  }

  #[tokio::test]
  async fn second_authority_answers_when_first_finds_nothing() {
    let empty = Arc::new(ScriptedAuthority::never_match("legislation"));
    let full =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.92, "case-3"));
    let verifier = Verifier::new(vec![empty, full], config(3));

    let result = verifier
      .verify(&claim("carol", "[2021] HCA 1"), &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.state, VerificationState::Verified);
    assert_eq!(result.source_reference.as_deref(), Some("austlii:case-3"));
  }

  #[tokio::test]
  async fn concurrent_verifies_of_one_claim_coalesce() {
    let authority = Arc::new(
      ScriptedAuthority::always_match("austlii", 0.95, "case-4")
        .with_delay(Duration::from_millis(50)),
    );
    let verifier =
      Arc::new(Verifier::new(vec![authority.clone()], config(3)));
    let c = claim("dave", "[2020] VSC 300");
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
      verifier.verify(&c, &cancel),
      verifier.verify(&c, &cancel)
    );

    assert_eq!(authority.calls(), 1);
    assert_eq!(a.unwrap().state, VerificationState::Verified);
    assert_eq!(b.unwrap().state, VerificationState::Verified);
  }

  #[tokio::test]
  async fn slow_authority_times_out_each_attempt_then_unverifiable() {
    let authority = Arc::new(
      ScriptedAuthority::always_match("sluggish", 0.95, "case-5")
        .with_delay(Duration::from_millis(200)),
    );
    let mut cfg = config(2);
    cfg.call_timeout_ms = 20;
    let verifier = Verifier::new(vec![authority.clone()], cfg);

    let result = verifier
      .verify(&claim("frank", "[2018] VCAT 77"), &CancellationToken::new())
      .await
      .unwrap();

    // The deadline trips on every attempt; timeouts are transient, so the
    // attempt budget is spent before the claim settles as unverifiable.
    assert_eq!(result.state, VerificationState::Unverifiable);
    assert_eq!(authority.calls(), 2);
  }

  #[tokio::test]
  async fn admission_permits_bound_concurrent_lookups() {
    struct GaugedAuthority {
      current: AtomicUsize,
      peak:    AtomicUsize,
    }

    #[async_trait]
    impl Authority for GaugedAuthority {
      fn name(&self) -> &str { "gauged" }

      async fn lookup(
        &self,
        _query: &LookupQuery,
      ) -> Result<LookupOutcome, LookupError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(LookupOutcome {
          matched:      true,
          contradicted: false,
          reference_id: Some("ref".into()),
          confidence:   0.95,
        })
      }
    }

    let authority = Arc::new(GaugedAuthority {
      current: AtomicUsize::new(0),
      peak:    AtomicUsize::new(0),
    });
    let mut cfg = config(3);
    cfg.max_in_flight = 2;
    let verifier = Arc::new(Verifier::new(
      vec![authority.clone() as Arc<dyn Authority>],
      cfg,
    ));

    let mut tasks = Vec::new();
    for i in 0..8 {
      let verifier = verifier.clone();
      tasks.push(tokio::spawn(async move {
        verifier
          .verify(
            &claim("grace", &format!("[2017] VCAT {i}")),
            &CancellationToken::new(),
          )
          .await
      }));
    }
    for task in tasks {
      let result = task.await.unwrap().unwrap();
      assert_eq!(result.state, VerificationState::Verified);
    }

    let peak = authority.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak in-flight was {peak}");
  }

  #[tokio::test]
  async fn cancelled_verify_clears_the_coalescing_gate() {
    let authority =
      Arc::new(ScriptedAuthority::always_match("austlii", 0.95, "case-6"));
    let verifier = Verifier::new(vec![authority], config(3));
    let c = claim("heidi", "[2016] VCAT 11");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = verifier.verify(&c, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(verifier.in_flight.is_empty());

    // A later attempt with a live token proceeds normally.
    let result =
      verifier.verify(&c, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.state, VerificationState::Verified);
  }

  #[tokio::test]
  async fn cancellation_interrupts_backoff() {
    let authority = Arc::new(ScriptedAuthority::never_match("flaky"));
    authority.push_steps(vec![ScriptedStep::Transient("blip".into())]);
    let mut cfg = config(3);
    cfg.backoff_base_ms = 60_000; // were it not cancelled, this would hang
    let verifier = Verifier::new(vec![authority], cfg);

    let cancel = CancellationToken::new();
    let c = claim("erin", "[2019] VCAT 5");

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      cancel_clone.cancel();
    });

    let err = verifier.verify(&c, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
  }
}
