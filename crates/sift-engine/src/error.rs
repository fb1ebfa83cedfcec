use sift_core::claim::VerificationState;

/// Run-level failures. Per-record defects never appear here; they are
/// quarantined by the pipeline and reported in the run output instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Zero evidence items survived normalisation.
  #[error("corpus is empty after normalisation")]
  EmptyCorpus,
  /// An illegal state-machine transition surfaced mid-run; indicates a bug
  /// in the pipeline's verification bookkeeping, not bad input.
  #[error("illegal verification transition: {from} -> {to}")]
  InvalidTransition {
    from: VerificationState,
    to:   VerificationState,
  },
  #[error(transparent)]
  Core(sift_core::Error),
  #[error(transparent)]
  Oracle(#[from] sift_oracle::Error),
}

impl From<sift_core::Error> for Error {
  fn from(e: sift_core::Error) -> Self {
    match e {
      sift_core::Error::EmptyCorpus => Self::EmptyCorpus,
      sift_core::Error::TerminalTransition { from, to } => {
        Self::InvalidTransition { from, to }
      }
      other => Self::Core(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
