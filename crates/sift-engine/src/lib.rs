//! The Sift correlation and synthesis engine.
//!
//! Data flows one direction:
//!
//! ```text
//! SourceRecord
//!     └─ normalize  → EvidenceItem (malformed records quarantined)
//!          └─ dedupe → surviving items, chain of custody preserved
//!               ├─ timeline  → total-order TimelineEntry sequence
//!               ├─ graph     → weighted RelationshipEdge set
//!               └─ claims    → Claim triples
//!                    └─ verify (sift-oracle) → terminal states
//!                         └─ synthesize → Narrative
//! ```
//!
//! Each stage consumes only the typed output of its declared predecessor;
//! there is no shared global state and no coordinator reaching across
//! stages.

pub mod claims;
pub mod dedupe;
mod error;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod synthesize;
pub mod timeline;

pub use error::{Error, Result};
pub use pipeline::{Engine, Quarantined, RunOutput, RunSummary};
