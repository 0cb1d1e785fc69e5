use std::collections::{BTreeSet, HashMap};

use super::types::{RecommendedProduct, ScoredCandidate};
use crate::domain::product::{CatalogProduct, ProductId};
use crate::taxonomy::EffectId;

/// Maps surviving ids to response items, keeping their order. Ids missing from
/// either map are skipped.
pub fn assemble(
    ids: &[ProductId],
    scored: &HashMap<ProductId, &ScoredCandidate>,
    products: &HashMap<ProductId, (&CatalogProduct, &BTreeSet<EffectId>)>,
) -> Vec<RecommendedProduct> {
    ids.iter()
        .filter_map(|id| {
            let candidate = scored.get(id)?;
            let (product, tags) = products.get(id)?;
            Some(RecommendedProduct {
                product_id: product.id,
                category: product.category.code(),
                name: product.name.clone(),
                brand: product.brand.clone(),
                price: product.price,
                stock: product.stock,
                thumbnail: product.thumbnail.clone(),
                discount_rate: product.discount_rate,
                discount_price: product.discount_price(),
                score: candidate.score,
                similarity: candidate.best_similarity,
                rank_order: candidate.best_rank,
                effect_tags: tags.iter().copied().collect(),
            })
        })
        .collect()
}
