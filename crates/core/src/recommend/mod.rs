//! Product recommendation pipeline.
//!
//! A call resolves the member's desired effects, builds a candidate pool for the
//! anchor (precomputed neighbors or live tag overlap), scores and excludes
//! candidates, mixes a deterministic core slice with a weighted random draw,
//! caps brand repetition and assembles the response items.

mod assemble;
mod candidates;
mod concerns;
mod counters;
mod diversity;
mod engine;
mod sampling;
mod scoring;
mod source;
mod types;

pub use assemble::assemble;
pub use candidates::{build_external_pool, build_internal_pool, tag_similarity};
pub use concerns::DesiredEffects;
pub use counters::{CountersSnapshot, EngineCounters};
pub use diversity::{cap_per_brand, DiversitySampler};
pub use engine::RecommendationEngine;
pub use sampling::weighted_sample_without_replacement;
pub use scoring::{ScoreOutcome, Scorer, ScoringContext};
pub use source::RecommendationSource;
pub use types::*;

/// Rank reported for candidates that did not come from a neighbor edge.
pub const UNRANKED: u32 = 9999;
