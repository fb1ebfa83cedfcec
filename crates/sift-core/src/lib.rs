//! Core types and trait definitions for the Sift evidence engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod claim;
pub mod config;
pub mod error;
pub mod evidence;
pub mod narrative;
pub mod oracle;
pub mod store;

pub use error::{Error, Result};
