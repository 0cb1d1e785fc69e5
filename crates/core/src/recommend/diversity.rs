use std::collections::HashMap;

use rand::Rng;

use super::sampling::weighted_sample_without_replacement;
use super::types::ScoredCandidate;
use crate::domain::product::ProductId;

/// Splits a ranking into a deterministic core slice and a weighted random
/// variable slice.
#[derive(Clone, Copy, Debug)]
pub struct DiversitySampler {
    core_ratio: f64,
}

impl DiversitySampler {
    pub fn new(core_ratio: f64) -> Self {
        Self { core_ratio }
    }

    pub fn core_count(&self, final_limit: usize) -> usize {
        ((self.core_ratio * final_limit as f64).floor() as usize).max(1)
    }

    /// Core ids in score order followed by sampled ids in draw order.
    pub fn mix<R: Rng + ?Sized>(
        &self,
        scored: &[ScoredCandidate],
        final_limit: usize,
        rng: &mut R,
    ) -> Vec<ProductId> {
        if scored.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<&ScoredCandidate> = scored.iter().collect();
        // Stable: equal scores keep pool order.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let core_count = self.core_count(final_limit).min(ranked.len());
        let variable_count = final_limit.saturating_sub(core_count);

        let mut mixed: Vec<ProductId> =
            ranked[..core_count].iter().map(|candidate| candidate.product_id).collect();
        let remaining: Vec<(ProductId, f64)> = ranked[core_count..]
            .iter()
            .map(|candidate| (candidate.product_id, candidate.score))
            .collect();
        mixed.extend(weighted_sample_without_replacement(&remaining, variable_count, rng));
        mixed
    }
}

/// Keeps at most `max_per_brand` ids per brand without reordering, then
/// truncates to `final_limit`. Ids with no known brand are dropped. Under-filled
/// results are not back-filled.
pub fn cap_per_brand(
    ids: &[ProductId],
    brand_of: &HashMap<ProductId, &str>,
    max_per_brand: usize,
    final_limit: usize,
) -> Vec<ProductId> {
    let mut per_brand: HashMap<&str, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(ids.len().min(final_limit));

    for id in ids {
        let Some(brand) = brand_of.get(id) else {
            continue;
        };
        let count = per_brand.entry(*brand).or_insert(0);
        if *count < max_per_brand {
            *count += 1;
            kept.push(*id);
        }
    }

    kept.truncate(final_limit);
    kept
}
