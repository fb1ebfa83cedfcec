//! Error type for `sift-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Includes the chain-of-custody digest mismatch surfaced on load: a
  /// tampered row is an error, never a silently skipped item.
  #[error("core error: {0}")]
  Core(#[from] sift_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a discriminant string no variant recognises.
  #[error("unknown {column} value: {value:?}")]
  UnknownDiscriminant { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
