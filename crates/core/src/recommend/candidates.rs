use std::collections::{BTreeSet, HashMap};

use super::types::Candidate;
use super::UNRANKED;
use crate::domain::product::{CatalogProduct, NeighborEdge, ProductId};
use crate::taxonomy::EffectId;

/// Cosine-style overlap `|A ∩ B| / sqrt(|A| * |B|)`; zero when either side is empty.
pub fn tag_similarity(a: &BTreeSet<EffectId>, b: &BTreeSet<EffectId>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    if overlap == 0 {
        return 0.0;
    }
    overlap as f64 / ((a.len() * b.len()) as f64).sqrt()
}

fn eligible(product: &CatalogProduct, anchor_product: Option<ProductId>) -> bool {
    product.active && product.in_stock() && Some(product.id) != anchor_product
}

/// Pool for a catalog-linked anchor.
///
/// Edges pointing at the same neighbor are merged (max similarity, min rank).
/// Order follows the first edge seen for each neighbor. Neighbors without a
/// product row are skipped.
pub fn build_internal_pool(
    anchor_product: ProductId,
    edges: &[NeighborEdge],
    products: Vec<CatalogProduct>,
    tags: &HashMap<ProductId, BTreeSet<EffectId>>,
) -> Vec<Candidate> {
    let mut order: Vec<ProductId> = Vec::new();
    let mut best: HashMap<ProductId, (f64, u32)> = HashMap::new();
    for edge in edges {
        let neighbor = edge.neighbor_product_id;
        if neighbor == anchor_product {
            continue;
        }
        match best.get_mut(&neighbor) {
            Some((similarity, rank)) => {
                *similarity = similarity.max(edge.sim_overall);
                *rank = (*rank).min(edge.rank_order);
            }
            None => {
                best.insert(neighbor, (edge.sim_overall, edge.rank_order));
                order.push(neighbor);
            }
        }
    }

    let mut by_id: HashMap<ProductId, CatalogProduct> =
        products.into_iter().map(|product| (product.id, product)).collect();

    order
        .into_iter()
        .filter_map(|id| {
            let product = by_id.remove(&id)?;
            if !eligible(&product, Some(anchor_product)) {
                return None;
            }
            let (similarity, best_rank) = best.get(&id).copied()?;
            Some(Candidate {
                effect_tags: tags.get(&id).cloned().unwrap_or_default(),
                product,
                similarity,
                best_rank,
            })
        })
        .collect()
}

/// Pool for a free-text anchor: every active product with a positive tag
/// overlap against `desired`, in catalog order.
pub fn build_external_pool(
    anchor_product: Option<ProductId>,
    desired: &BTreeSet<EffectId>,
    products: Vec<CatalogProduct>,
    tags: &HashMap<ProductId, BTreeSet<EffectId>>,
) -> Vec<Candidate> {
    if desired.is_empty() {
        return Vec::new();
    }

    products
        .into_iter()
        .filter(|product| eligible(product, anchor_product))
        .filter_map(|product| {
            let effect_tags = tags.get(&product.id).cloned().unwrap_or_default();
            let similarity = tag_similarity(desired, &effect_tags);
            (similarity > 0.0).then_some(Candidate {
                product,
                effect_tags,
                similarity,
                best_rank: UNRANKED,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rust_decimal::Decimal;

    use super::{build_external_pool, build_internal_pool, tag_similarity};
    use crate::domain::product::{CatalogProduct, NeighborEdge, ProductId};
    use crate::recommend::UNRANKED;
    use crate::taxonomy::{effect_set, Category, Effect, EffectId};

    fn product(id: i64, stock: i64) -> CatalogProduct {
        CatalogProduct {
            id: ProductId(id),
            category: Category::Toner,
            brand: format!("brand-{id}"),
            name: format!("product-{id}"),
            price: Decimal::new(12_000, 0),
            discount_rate: Decimal::ZERO,
            stock,
            active: true,
            thumbnail: None,
        }
    }

    fn edge(neighbor: i64, sim: f64, rank: u32) -> NeighborEdge {
        NeighborEdge {
            base_product_id: ProductId(1),
            neighbor_product_id: ProductId(neighbor),
            sim_overall: sim,
            rank_order: rank,
        }
    }

    #[test]
    fn similarity_is_cosine_overlap() {
        let a = effect_set(&[Effect::Moisturizing, Effect::Soothing]);
        let b = effect_set(&[Effect::Soothing, Effect::AcneRelief, Effect::PoreCare, Effect::OilControl]);

        let sim = tag_similarity(&a, &b);
        assert!((sim - 1.0 / 8f64.sqrt()).abs() < 1e-12);
        assert!((tag_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn similarity_is_zero_for_empty_or_disjoint_sets() {
        let a = effect_set(&[Effect::Moisturizing]);
        let b = effect_set(&[Effect::GutHealth]);
        assert_eq!(tag_similarity(&a, &BTreeSet::new()), 0.0);
        assert_eq!(tag_similarity(&BTreeSet::new(), &a), 0.0);
        assert_eq!(tag_similarity(&a, &b), 0.0);
    }

    #[test]
    fn internal_pool_merges_duplicate_edges_and_keeps_first_seen_order() {
        let edges = [edge(3, 0.6, 4), edge(2, 0.9, 1), edge(3, 0.7, 2)];
        let pool = build_internal_pool(
            ProductId(1),
            &edges,
            vec![product(2, 5), product(3, 5)],
            &HashMap::new(),
        );

        let ids: Vec<i64> = pool.iter().map(|c| c.product.id.0).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!((pool[0].similarity - 0.7).abs() < 1e-12);
        assert_eq!(pool[0].best_rank, 2);
        assert!(pool[0].effect_tags.is_empty());
    }

    #[test]
    fn internal_pool_drops_self_stock_outs_inactive_and_missing_rows() {
        let mut inactive = product(5, 9);
        inactive.active = false;
        let edges = [edge(1, 1.0, 1), edge(2, 0.9, 2), edge(3, 0.8, 3), edge(4, 0.7, 4), edge(5, 0.6, 5)];
        let mut tags = HashMap::new();
        tags.insert(ProductId(2), effect_set(&[Effect::Brightening]));

        let pool = build_internal_pool(
            ProductId(1),
            &edges,
            vec![product(1, 3), product(2, 3), product(3, 0), inactive],
            &tags,
        );

        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].product.id, ProductId(2));
        assert_eq!(pool[0].effect_tags, effect_set(&[Effect::Brightening]));
    }

    #[test]
    fn external_pool_scores_by_overlap_and_drops_zero_similarity() {
        let desired = effect_set(&[Effect::AcneRelief, Effect::Soothing]);
        let mut tags: HashMap<ProductId, BTreeSet<EffectId>> = HashMap::new();
        tags.insert(ProductId(10), effect_set(&[Effect::AcneRelief]));
        tags.insert(ProductId(11), effect_set(&[Effect::GutHealth]));
        tags.insert(ProductId(12), effect_set(&[Effect::Soothing]));

        let pool = build_external_pool(
            None,
            &desired,
            vec![product(10, 2), product(11, 2), product(12, 0), product(13, 2)],
            &tags,
        );

        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].product.id, ProductId(10));
        assert_eq!(pool[0].best_rank, UNRANKED);
        assert!((pool[0].similarity - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn external_pool_is_empty_without_desired_effects() {
        let mut tags = HashMap::new();
        tags.insert(ProductId(10), effect_set(&[Effect::AcneRelief]));

        let pool = build_external_pool(None, &BTreeSet::new(), vec![product(10, 2)], &tags);
        assert!(pool.is_empty());
    }
}
