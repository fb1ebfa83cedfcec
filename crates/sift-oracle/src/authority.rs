//! Authority implementations.
//!
//! [`HttpAuthority`] speaks to a real external source over JSON;
//! [`ScriptedAuthority`] is the in-process double used by tests and dry
//! runs. Both satisfy the same `Authority` contract, so the verifier never
//! cares which it is talking to.

use std::{
  collections::VecDeque,
  sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use sift_core::oracle::{Authority, LookupError, LookupOutcome, LookupQuery};

// ─── HTTP authority ──────────────────────────────────────────────────────────

/// An external authority reached over HTTP. The query triple is POSTed as
/// JSON and the response is expected in the uniform lookup shape.
pub struct HttpAuthority {
  name:     String,
  endpoint: String,
  client:   reqwest::Client,
}

/// Wire shape of an authority response.
#[derive(Debug, Deserialize)]
struct WireOutcome {
  matched:      bool,
  #[serde(default)]
  contradicted: bool,
  #[serde(default)]
  reference_id: Option<String>,
  #[serde(default)]
  confidence:   f64,
}

impl HttpAuthority {
  pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
    Self {
      name:     name.into(),
      endpoint: endpoint.into(),
      client:   reqwest::Client::new(),
    }
  }
}

#[async_trait]
impl Authority for HttpAuthority {
  fn name(&self) -> &str { &self.name }

  async fn lookup(
    &self,
    query: &LookupQuery,
  ) -> Result<LookupOutcome, LookupError> {
    let response = self
      .client
      .post(&self.endpoint)
      .json(query)
      .send()
      .await
      .map_err(|e| {
        if e.is_timeout() || e.is_connect() {
          LookupError::Transient(e.to_string())
        } else {
          LookupError::Failed(e.to_string())
        }
      })?;

    let status = response.status();
    if status.as_u16() == 429 {
      return Err(LookupError::RateLimited);
    }
    if status.is_server_error() {
      return Err(LookupError::Transient(format!("status {status}")));
    }
    if !status.is_success() {
      return Err(LookupError::Failed(format!("status {status}")));
    }

    let wire: WireOutcome = response
      .json()
      .await
      .map_err(|e| LookupError::Failed(e.to_string()))?;

    Ok(LookupOutcome {
      matched:      wire.matched,
      contradicted: wire.contradicted,
      reference_id: wire.reference_id,
      confidence:   wire.confidence,
    })
  }
}

// ─── Scripted authority ──────────────────────────────────────────────────────

/// One pre-programmed response for a [`ScriptedAuthority`].
#[derive(Debug, Clone)]
pub enum ScriptedStep {
  Answer(LookupOutcome),
  Transient(String),
  Fail(String),
}

/// An authority that replays a scripted sequence of responses, then falls
/// back to a fixed default. Counts its calls so tests can assert on cache
/// short-circuits and coalescing.
pub struct ScriptedAuthority {
  name:    String,
  steps:   Mutex<VecDeque<ScriptedStep>>,
  default: ScriptedStep,
  calls:   AtomicUsize,
  delay:   Option<Duration>,
}

impl ScriptedAuthority {
  pub fn new(name: impl Into<String>, default: ScriptedStep) -> Self {
    Self {
      name:    name.into(),
      steps:   Mutex::new(VecDeque::new()),
      default,
      calls:   AtomicUsize::new(0),
      delay:   None,
    }
  }

  /// An authority that confirms every query at the given confidence.
  pub fn always_match(
    name: impl Into<String>,
    confidence: f64,
    reference_id: impl Into<String>,
  ) -> Self {
    Self::new(
      name,
      ScriptedStep::Answer(LookupOutcome {
        matched: true,
        contradicted: false,
        reference_id: Some(reference_id.into()),
        confidence,
      }),
    )
  }

  /// An authority that finds nothing, ever.
  pub fn never_match(name: impl Into<String>) -> Self {
    Self::new(
      name,
      ScriptedStep::Answer(LookupOutcome {
        matched:      false,
        contradicted: false,
        reference_id: None,
        confidence:   0.0,
      }),
    )
  }

  /// An authority that explicitly contradicts every query.
  pub fn always_contradict(name: impl Into<String>) -> Self {
    Self::new(
      name,
      ScriptedStep::Answer(LookupOutcome {
        matched:      false,
        contradicted: true,
        reference_id: Some("contradiction".into()),
        confidence:   0.9,
      }),
    )
  }

  /// Queue responses consumed before the default kicks in.
  pub fn push_steps(&self, steps: impl IntoIterator<Item = ScriptedStep>) {
    let mut queue = self.steps.lock().expect("script lock");
    queue.extend(steps);
  }

  /// Make every call take this long; used to exercise coalescing.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Authority for ScriptedAuthority {
  fn name(&self) -> &str { &self.name }

  async fn lookup(
    &self,
    _query: &LookupQuery,
  ) -> Result<LookupOutcome, LookupError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    let step = {
      let mut queue = self.steps.lock().expect("script lock");
      queue.pop_front().unwrap_or_else(|| self.default.clone())
    };
    match step {
      ScriptedStep::Answer(outcome) => Ok(outcome),
      ScriptedStep::Transient(msg) => Err(LookupError::Transient(msg)),
      ScriptedStep::Fail(msg) => Err(LookupError::Failed(msg)),
    }
  }
}
