use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use carely_core::domain::anchor::{AnchorId, AnchorItem};
use carely_core::domain::member::{ConcernFlags, MemberId, MemberProfile, SkinType};
use carely_core::domain::product::{CatalogProduct, NeighborEdge, ProductId, SkinCompatibility};
use carely_core::errors::ApplicationError;
use carely_core::recommend::{RecommendationResponse, RecommendationSource};
use carely_core::taxonomy::EffectId;

use super::cache::{expires_at, RecommendationCacheKey};
use super::{RecommendationCache, RepositoryError};

/// Process-local catalog used by server tests and local wiring.
#[derive(Default)]
pub struct InMemoryRecommendationSource {
    members: RwLock<HashMap<MemberId, MemberProfile>>,
    anchors: RwLock<HashMap<AnchorId, AnchorItem>>,
    products: RwLock<HashMap<ProductId, CatalogProduct>>,
    effect_tags: RwLock<HashMap<ProductId, BTreeSet<EffectId>>>,
    edges: RwLock<HashMap<ProductId, Vec<NeighborEdge>>>,
    compatibility: RwLock<HashMap<(ProductId, SkinType), SkinCompatibility>>,
}

impl InMemoryRecommendationSource {
    pub async fn save_member(&self, member: MemberProfile) {
        self.members.write().await.insert(member.id, member);
    }

    pub async fn save_anchor(&self, anchor: AnchorItem) {
        self.anchors.write().await.insert(anchor.id, anchor);
    }

    pub async fn save_product(&self, product: CatalogProduct, tags: BTreeSet<EffectId>) {
        self.effect_tags.write().await.insert(product.id, tags);
        self.products.write().await.insert(product.id, product);
    }

    pub async fn save_edge(&self, edge: NeighborEdge) {
        let mut edges = self.edges.write().await;
        let list = edges.entry(edge.base_product_id).or_default();
        list.retain(|existing| existing.neighbor_product_id != edge.neighbor_product_id);
        list.push(edge);
        list.sort_by_key(|existing| (existing.rank_order, existing.neighbor_product_id));
    }

    pub async fn save_compatibility(
        &self,
        product_id: ProductId,
        skin_type: SkinType,
        compatibility: SkinCompatibility,
    ) {
        self.compatibility.write().await.insert((product_id, skin_type), compatibility);
    }
}

#[async_trait]
impl RecommendationSource for InMemoryRecommendationSource {
    async fn find_anchor_owner(&self, anchor_id: AnchorId) -> Result<Option<MemberId>, ApplicationError> {
        Ok(self.anchors.read().await.get(&anchor_id).map(|anchor| anchor.member_id))
    }

    async fn get_anchor(&self, anchor_id: AnchorId) -> Result<Option<AnchorItem>, ApplicationError> {
        let Some(mut anchor) = self.anchors.read().await.get(&anchor_id).cloned() else {
            return Ok(None);
        };
        // Linked anchors take the category of their catalog product, if any.
        if let Some(product_id) = anchor.product_id {
            anchor.category =
                self.products.read().await.get(&product_id).map(|product| product.category);
        }
        Ok(Some(anchor))
    }

    async fn get_member_skin_type(&self, member_id: MemberId) -> Result<Option<SkinType>, ApplicationError> {
        Ok(self.members.read().await.get(&member_id).and_then(|member| member.skin_type))
    }

    async fn get_concern_flags(&self, member_id: MemberId) -> Result<ConcernFlags, ApplicationError> {
        Ok(self
            .members
            .read()
            .await
            .get(&member_id)
            .map(|member| member.concerns.clone())
            .unwrap_or_default())
    }

    async fn get_neighbor_edges(
        &self,
        product_id: ProductId,
        top_k: u32,
    ) -> Result<Vec<NeighborEdge>, ApplicationError> {
        let edges = self.edges.read().await;
        Ok(edges
            .get(&product_id)
            .map(|list| list.iter().take(top_k as usize).copied().collect())
            .unwrap_or_default())
    }

    async fn get_products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, ApplicationError> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn get_all_active_products(&self) -> Result<Vec<CatalogProduct>, ApplicationError> {
        let products = self.products.read().await;
        let mut active: Vec<CatalogProduct> =
            products.values().filter(|product| product.active).cloned().collect();
        active.sort_by_key(|product| product.id);
        Ok(active)
    }

    async fn get_effect_tags(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, BTreeSet<EffectId>>, ApplicationError> {
        let tags = self.effect_tags.read().await;
        Ok(ids.iter().filter_map(|id| tags.get(id).map(|set| (*id, set.clone()))).collect())
    }

    async fn get_skin_compatibility(
        &self,
        ids: &[ProductId],
        skin_type: SkinType,
    ) -> Result<HashMap<ProductId, SkinCompatibility>, ApplicationError> {
        let compatibility = self.compatibility.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| compatibility.get(&(*id, skin_type)).map(|flag| (*id, *flag)))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryRecommendationCache {
    entries: RwLock<HashMap<String, (RecommendationResponse, i64)>>,
}

#[async_trait]
impl RecommendationCache for InMemoryRecommendationCache {
    async fn get(
        &self,
        key: &RecommendationCacheKey,
    ) -> Result<Option<RecommendationResponse>, RepositoryError> {
        let now = Utc::now().timestamp();
        let entries = self.entries.read().await;
        Ok(entries
            .get(&key.to_string())
            .filter(|(_, expires)| *expires > now)
            .map(|(response, _)| response.clone()))
    }

    async fn put(
        &self,
        key: &RecommendationCacheKey,
        response: &RecommendationResponse,
        ttl: Duration,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (response.clone(), expires_at(now, ttl)));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires)| *expires > now);
        Ok((before - entries.len()) as u64)
    }
}
