use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::anchor::AnchorId;
use crate::domain::member::MemberId;
use crate::domain::product::{CatalogProduct, ProductId};
use crate::taxonomy::EffectId;

/// Inbound request for one recommendation call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub anchor_id: AnchorId,
    pub member_id: MemberId,
    /// Falls back to the configured final limit.
    pub limit: Option<u32>,
    /// Falls back to the configured neighbor fan-out.
    pub top_k: Option<u32>,
}

impl RecommendationRequest {
    pub fn new(anchor_id: AnchorId, member_id: MemberId) -> Self {
        Self { anchor_id, member_id, limit: None, top_k: None }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// How the candidate pool was sourced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// Precomputed neighbor edges of a catalog-linked anchor.
    Internal,
    /// Whole active catalog scored by effect-tag overlap.
    External,
}

/// A pool member before scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub product: CatalogProduct,
    pub effect_tags: BTreeSet<EffectId>,
    pub similarity: f64,
    pub best_rank: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub product_id: ProductId,
    pub score: f64,
    pub best_similarity: f64,
    pub best_rank: u32,
    pub matched_effects: BTreeSet<EffectId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendedProduct {
    pub product_id: ProductId,
    pub category: i64,
    pub name: String,
    pub brand: String,
    pub price: Decimal,
    pub stock: i64,
    pub thumbnail: Option<String>,
    pub discount_rate: Decimal,
    pub discount_price: Decimal,
    pub score: f64,
    pub similarity: f64,
    pub rank_order: u32,
    pub effect_tags: Vec<EffectId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub anchor_id: AnchorId,
    pub mode: PoolMode,
    pub items: Vec<RecommendedProduct>,
}

impl RecommendationResponse {
    pub fn empty(anchor_id: AnchorId, mode: PoolMode) -> Self {
        Self { anchor_id, mode, items: Vec::new() }
    }
}
