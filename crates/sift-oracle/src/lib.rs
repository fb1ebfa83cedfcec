//! Verification oracle client for Sift.
//!
//! Wraps one or more external authoritative lookup sources behind a uniform
//! `verify(claim)` call with TTL caching, bounded exponential-backoff retry,
//! per-claim request coalescing, admission control, and cancellation. The
//! only component of the engine that performs external I/O.

pub mod authority;
pub mod cache;
pub mod client;
pub mod error;

pub use authority::{HttpAuthority, ScriptedAuthority, ScriptedStep};
pub use sift_core::oracle::Authority;
pub use cache::VerificationCache;
pub use client::Verifier;
pub use error::{Error, Result};
