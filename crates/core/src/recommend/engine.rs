//! Recommendation engine: loads a call's data from the source, then ranks it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::assemble::assemble;
use super::candidates::{build_external_pool, build_internal_pool};
use super::concerns::DesiredEffects;
use super::counters::EngineCounters;
use super::diversity::{cap_per_brand, DiversitySampler};
use super::scoring::{Scorer, ScoringContext};
use super::source::RecommendationSource;
use super::types::{
    Candidate, PoolMode, RecommendationRequest, RecommendationResponse, ScoredCandidate,
};
use crate::config::RecommendationConfig;
use crate::domain::anchor::{AnchorId, AnchorItem};
use crate::domain::product::{CatalogProduct, ProductId, SkinCompatibility};
use crate::errors::{ApplicationError, DomainError};
use crate::taxonomy::{Category, DomainGroup, EffectId};

/// Everything ranking needs, loaded before any randomness is drawn.
struct PreparedPool {
    anchor_id: AnchorId,
    mode: PoolMode,
    anchor_category: Option<Category>,
    desired: DesiredEffects,
    candidates: Vec<Candidate>,
    compatibility: HashMap<ProductId, SkinCompatibility>,
    limit: usize,
}

enum Prepared {
    Empty(RecommendationResponse),
    Ready(PreparedPool),
}

#[derive(Clone)]
pub struct RecommendationEngine {
    source: Arc<dyn RecommendationSource>,
    config: RecommendationConfig,
    counters: Arc<EngineCounters>,
}

impl RecommendationEngine {
    pub fn new(source: Arc<dyn RecommendationSource>, config: RecommendationConfig) -> Self {
        Self { source, config, counters: Arc::new(EngineCounters::default()) }
    }

    pub fn counters(&self) -> Arc<EngineCounters> {
        Arc::clone(&self.counters)
    }

    /// Resolves the effective `(limit, top_k)` for a request.
    pub fn effective_bounds(
        &self,
        request: &RecommendationRequest,
    ) -> Result<(u32, u32), DomainError> {
        let limit = bounded(
            "limit",
            request.limit.unwrap_or(self.config.final_limit),
            self.config.max_final_limit,
        )?;
        let top_k =
            bounded("top_k", request.top_k.unwrap_or(self.config.top_k_per_base), self.config.max_top_k)?;
        Ok((limit, top_k))
    }

    /// Ranks with a freshly seeded RNG, so repeated calls differ in the
    /// variable slice.
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, ApplicationError> {
        let prepared = self.prepare(request).await?;
        let mut rng = StdRng::from_entropy();
        Ok(self.finish(prepared, &mut rng))
    }

    pub async fn recommend_with_rng<R: Rng + Send + ?Sized>(
        &self,
        request: &RecommendationRequest,
        rng: &mut R,
    ) -> Result<RecommendationResponse, ApplicationError> {
        let prepared = self.prepare(request).await?;
        Ok(self.finish(prepared, rng))
    }

    async fn prepare(&self, request: &RecommendationRequest) -> Result<Prepared, ApplicationError> {
        self.counters.record_request();
        let (limit, top_k) = self.effective_bounds(request)?;

        let owner = self
            .source
            .find_anchor_owner(request.anchor_id)
            .await?
            .ok_or(DomainError::AnchorNotFound(request.anchor_id))?;
        if owner != request.member_id {
            return Err(DomainError::AnchorNotOwned {
                anchor_id: request.anchor_id,
                member_id: request.member_id,
            }
            .into());
        }
        let anchor = self
            .source
            .get_anchor(request.anchor_id)
            .await?
            .ok_or(DomainError::AnchorNotFound(request.anchor_id))?;

        let skin_type = self.source.get_member_skin_type(request.member_id).await?;
        let desired = DesiredEffects::resolve(&self.source.get_concern_flags(request.member_id).await?);

        let (mode, candidates) = match anchor.product_id {
            Some(anchor_product) => {
                if anchor.category.is_none() {
                    self.counters.record_unresolved_category();
                    warn!(
                        event_name = "recommend.anchor.unresolved_category",
                        anchor_id = %anchor.id,
                        product_id = %anchor_product,
                        "catalog-linked anchor has no resolvable category; returning empty result"
                    );
                    return Ok(Prepared::Empty(RecommendationResponse::empty(
                        anchor.id,
                        PoolMode::Internal,
                    )));
                }
                (PoolMode::Internal, self.internal_pool(anchor_product, top_k).await?)
            }
            None => (PoolMode::External, self.external_pool(&anchor, &desired).await?),
        };

        debug!(
            event_name = "recommend.pool.built",
            anchor_id = %anchor.id,
            mode = ?mode,
            pool_size = candidates.len(),
            "candidate pool built"
        );

        if candidates.is_empty() {
            self.counters.record_empty_pool();
            return Ok(Prepared::Empty(RecommendationResponse::empty(anchor.id, mode)));
        }

        let compatibility = match skin_type {
            Some(skin_type) => {
                let skin_ids: Vec<ProductId> = candidates
                    .iter()
                    .filter(|c| c.product.category.group() == DomainGroup::Skin)
                    .map(|c| c.product.id)
                    .collect();
                if skin_ids.is_empty() {
                    HashMap::new()
                } else {
                    self.source.get_skin_compatibility(&skin_ids, skin_type).await?
                }
            }
            None => HashMap::new(),
        };

        Ok(Prepared::Ready(PreparedPool {
            anchor_id: anchor.id,
            mode,
            anchor_category: anchor.category,
            desired,
            candidates,
            compatibility,
            limit: limit as usize,
        }))
    }

    async fn internal_pool(
        &self,
        anchor_product: ProductId,
        top_k: u32,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let edges = self.source.get_neighbor_edges(anchor_product, top_k).await?;
        if edges.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = BTreeSet::new();
        let neighbor_ids: Vec<ProductId> = edges
            .iter()
            .map(|edge| edge.neighbor_product_id)
            .filter(|id| *id != anchor_product && seen.insert(*id))
            .collect();
        let products = self.source.get_products_by_ids(&neighbor_ids).await?;
        let tags = self.source.get_effect_tags(&neighbor_ids).await?;

        Ok(build_internal_pool(anchor_product, &edges, products, &tags))
    }

    async fn external_pool(
        &self,
        anchor: &AnchorItem,
        desired: &DesiredEffects,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let target = desired.for_anchor(anchor.category.map(|category| category.group()));
        if target.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.source.get_all_active_products().await?;
        let ids: Vec<ProductId> = products.iter().map(|product| product.id).collect();
        let tags = self.source.get_effect_tags(&ids).await?;

        Ok(build_external_pool(anchor.product_id, &target, products, &tags))
    }

    fn finish<R: Rng + ?Sized>(&self, prepared: Prepared, rng: &mut R) -> RecommendationResponse {
        let pool = match prepared {
            Prepared::Empty(response) => return response,
            Prepared::Ready(pool) => pool,
        };

        let context = ScoringContext {
            anchor_category: pool.anchor_category,
            desired: &pool.desired,
            compatibility: &pool.compatibility,
        };
        let outcome = Scorer::new(self.config.weights).score(&pool.candidates, &context);
        self.counters.record_excluded_incompatible(outcome.excluded_incompatible);
        if outcome.scored.is_empty() {
            self.counters.record_empty_pool();
            return RecommendationResponse::empty(pool.anchor_id, pool.mode);
        }

        let sampler = DiversitySampler::new(self.config.core_ratio);
        let mixed = sampler.mix(&outcome.scored, pool.limit, rng);

        let brand_of: HashMap<ProductId, &str> = pool
            .candidates
            .iter()
            .map(|candidate| (candidate.product.id, candidate.product.brand.as_str()))
            .collect();
        let kept = cap_per_brand(&mixed, &brand_of, self.config.max_per_brand as usize, pool.limit);

        let scored: HashMap<ProductId, &ScoredCandidate> =
            outcome.scored.iter().map(|candidate| (candidate.product_id, candidate)).collect();
        let products: HashMap<ProductId, (&CatalogProduct, &BTreeSet<EffectId>)> = pool
            .candidates
            .iter()
            .map(|candidate| (candidate.product.id, (&candidate.product, &candidate.effect_tags)))
            .collect();
        let items = assemble(&kept, &scored, &products);

        info!(
            event_name = "recommend.completed",
            anchor_id = %pool.anchor_id,
            mode = ?pool.mode,
            scored = outcome.scored.len(),
            excluded_incompatible = outcome.excluded_incompatible,
            returned = items.len(),
            "recommendation ranked"
        );

        RecommendationResponse { anchor_id: pool.anchor_id, mode: pool.mode, items }
    }
}

fn bounded(name: &str, value: u32, max: u32) -> Result<u32, DomainError> {
    if value == 0 || value > max {
        return Err(DomainError::InvalidRequest(format!("{name} must be between 1 and {max}")));
    }
    Ok(value)
}
