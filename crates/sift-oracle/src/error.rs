//! Error type for `sift-oracle`.
//!
//! Note what is *not* here: retry exhaustion. A claim that exhausts its
//! attempts resolves to the `Unverifiable` state — a normal outcome the
//! caller receives as data, not as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The run-level cancellation token fired while this verification was in
  /// flight or sleeping between retries.
  #[error("verification cancelled")]
  Cancelled,

  #[error("core error: {0}")]
  Core(#[from] sift_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
