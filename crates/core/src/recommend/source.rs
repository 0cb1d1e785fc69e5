use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::domain::anchor::{AnchorId, AnchorItem};
use crate::domain::member::{ConcernFlags, MemberId, SkinType};
use crate::domain::product::{CatalogProduct, NeighborEdge, ProductId, SkinCompatibility};
use crate::errors::ApplicationError;
use crate::taxonomy::EffectId;

/// Read-only collaborators the engine pulls from on every call.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn find_anchor_owner(&self, anchor_id: AnchorId)
        -> Result<Option<MemberId>, ApplicationError>;

    async fn get_anchor(&self, anchor_id: AnchorId) -> Result<Option<AnchorItem>, ApplicationError>;

    async fn get_member_skin_type(
        &self,
        member_id: MemberId,
    ) -> Result<Option<SkinType>, ApplicationError>;

    async fn get_concern_flags(&self, member_id: MemberId) -> Result<ConcernFlags, ApplicationError>;

    /// At most `top_k` edges, best rank first.
    async fn get_neighbor_edges(
        &self,
        product_id: ProductId,
        top_k: u32,
    ) -> Result<Vec<NeighborEdge>, ApplicationError>;

    async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogProduct>, ApplicationError>;

    async fn get_all_active_products(&self) -> Result<Vec<CatalogProduct>, ApplicationError>;

    async fn get_effect_tags(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, BTreeSet<EffectId>>, ApplicationError>;

    async fn get_skin_compatibility(
        &self,
        ids: &[ProductId],
        skin_type: SkinType,
    ) -> Result<HashMap<ProductId, SkinCompatibility>, ApplicationError>;
}
