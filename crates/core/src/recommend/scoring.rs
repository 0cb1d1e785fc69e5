//! Composite scoring and hard exclusions.

use std::collections::{BTreeSet, HashMap};

use super::concerns::DesiredEffects;
use super::types::{Candidate, ScoredCandidate};
use crate::config::ScoringWeights;
use crate::domain::product::{ProductId, SkinCompatibility};
use crate::taxonomy::{Category, DomainGroup, EffectId};

/// Per-call inputs the scorer needs beyond the candidates themselves.
#[derive(Clone, Copy, Debug)]
pub struct ScoringContext<'a> {
    pub anchor_category: Option<Category>,
    pub desired: &'a DesiredEffects,
    /// Missing entries are neutral.
    pub compatibility: &'a HashMap<ProductId, SkinCompatibility>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreOutcome {
    /// Pool order is preserved.
    pub scored: Vec<ScoredCandidate>,
    pub excluded_incompatible: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, candidates: &[Candidate], context: &ScoringContext<'_>) -> ScoreOutcome {
        let mut outcome = ScoreOutcome::default();

        for candidate in candidates {
            let Some(compat) = self.compatibility_weight(candidate, context) else {
                outcome.excluded_incompatible += 1;
                continue;
            };

            let group = candidate.product.category.group();
            let matched_effects: BTreeSet<EffectId> = candidate
                .effect_tags
                .intersection(context.desired.for_group(group))
                .copied()
                .collect();
            let concern = 1.0 + self.weights.concern_boost_per_effect * matched_effects.len() as f64;
            let category = self.category_bonus(candidate.product.category, context.anchor_category);

            outcome.scored.push(ScoredCandidate {
                product_id: candidate.product.id,
                score: candidate.similarity * compat * concern * category,
                best_similarity: candidate.similarity,
                best_rank: candidate.best_rank,
                matched_effects,
            });
        }

        outcome
    }

    /// `None` means the candidate must be dropped.
    fn compatibility_weight(&self, candidate: &Candidate, context: &ScoringContext<'_>) -> Option<f64> {
        if candidate.product.category.group() != DomainGroup::Skin {
            return Some(1.0);
        }
        match context.compatibility.get(&candidate.product.id) {
            Some(SkinCompatibility::Incompatible) => None,
            Some(SkinCompatibility::Good) => Some(self.weights.good_compatibility),
            Some(SkinCompatibility::Neutral) | None => Some(1.0),
        }
    }

    fn category_bonus(&self, candidate: Category, anchor: Option<Category>) -> f64 {
        match anchor {
            Some(anchor) if anchor == candidate => self.weights.same_category,
            Some(anchor) if anchor.group() == candidate.group() => self.weights.same_group,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rust_decimal::Decimal;

    use super::{Scorer, ScoringContext};
    use crate::config::ScoringWeights;
    use crate::domain::product::{CatalogProduct, ProductId, SkinCompatibility};
    use crate::recommend::concerns::DesiredEffects;
    use crate::recommend::types::Candidate;
    use crate::taxonomy::{effect_set, Category, Effect, EffectId};

    fn candidate(id: i64, category: Category, similarity: f64, tags: BTreeSet<EffectId>) -> Candidate {
        Candidate {
            product: CatalogProduct {
                id: ProductId(id),
                category,
                brand: "Lumen".to_string(),
                name: format!("item-{id}"),
                price: Decimal::new(9_900, 0),
                discount_rate: Decimal::ZERO,
                stock: 4,
                active: true,
                thumbnail: None,
            },
            effect_tags: tags,
            similarity,
            best_rank: 1,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn incompatible_skin_candidate_is_excluded_even_at_full_similarity() {
        let desired = DesiredEffects::default();
        let mut compatibility = HashMap::new();
        compatibility.insert(ProductId(1), SkinCompatibility::Incompatible);
        let context = ScoringContext {
            anchor_category: Some(Category::Serum),
            desired: &desired,
            compatibility: &compatibility,
        };

        let outcome = Scorer::new(ScoringWeights::default()).score(
            &[
                candidate(1, Category::Serum, 1.0, BTreeSet::new()),
                candidate(2, Category::Serum, 0.4, BTreeSet::new()),
            ],
            &context,
        );

        assert_eq!(outcome.excluded_incompatible, 1);
        assert_eq!(outcome.scored.len(), 1);
        assert_eq!(outcome.scored[0].product_id, ProductId(2));
    }

    #[test]
    fn incompatibility_flag_is_ignored_outside_the_skin_group() {
        let desired = DesiredEffects::default();
        let mut compatibility = HashMap::new();
        compatibility.insert(ProductId(1), SkinCompatibility::Incompatible);
        let context =
            ScoringContext { anchor_category: None, desired: &desired, compatibility: &compatibility };

        let outcome = Scorer::new(ScoringWeights::default())
            .score(&[candidate(1, Category::Shampoo, 0.5, BTreeSet::new())], &context);

        assert_eq!(outcome.scored.len(), 1);
        assert!(close(outcome.scored[0].score, 0.5));
    }

    #[test]
    fn composite_score_multiplies_every_factor() {
        let mut desired = DesiredEffects::default();
        desired.skin = effect_set(&[Effect::AcneRelief, Effect::Soothing]);
        let mut compatibility = HashMap::new();
        compatibility.insert(ProductId(1), SkinCompatibility::Good);
        let context = ScoringContext {
            anchor_category: Some(Category::Serum),
            desired: &desired,
            compatibility: &compatibility,
        };

        let tags = effect_set(&[Effect::AcneRelief, Effect::Soothing, Effect::Brightening]);
        let outcome = Scorer::new(ScoringWeights::default())
            .score(&[candidate(1, Category::Serum, 0.5, tags)], &context);

        let scored = &outcome.scored[0];
        assert!(close(scored.score, 0.5 * 1.20 * 1.16 * 1.10));
        assert_eq!(scored.matched_effects, effect_set(&[Effect::AcneRelief, Effect::Soothing]));
        assert!(close(scored.best_similarity, 0.5));
    }

    #[test]
    fn concern_boost_uses_the_candidates_own_group() {
        let mut desired = DesiredEffects::default();
        desired.skin = effect_set(&[Effect::Moisturizing]);
        let compatibility = HashMap::new();
        let context =
            ScoringContext { anchor_category: None, desired: &desired, compatibility: &compatibility };

        // Collagen (health) tagged moisturizing does not match the skin set.
        let outcome = Scorer::new(ScoringWeights::default()).score(
            &[candidate(1, Category::Collagen, 0.8, effect_set(&[Effect::Moisturizing]))],
            &context,
        );

        assert!(outcome.scored[0].matched_effects.is_empty());
        assert!(close(outcome.scored[0].score, 0.8));
    }

    #[test]
    fn category_bonus_distinguishes_same_category_and_same_group() {
        let desired = DesiredEffects::default();
        let compatibility = HashMap::new();
        let context = ScoringContext {
            anchor_category: Some(Category::Toner),
            desired: &desired,
            compatibility: &compatibility,
        };

        let outcome = Scorer::new(ScoringWeights::default()).score(
            &[
                candidate(1, Category::Toner, 1.0, BTreeSet::new()),
                candidate(2, Category::Mask, 1.0, BTreeSet::new()),
                candidate(3, Category::Probiotic, 1.0, BTreeSet::new()),
            ],
            &context,
        );

        let scores: Vec<f64> = outcome.scored.iter().map(|c| c.score).collect();
        assert!(close(scores[0], 1.10));
        assert!(close(scores[1], 1.05));
        assert!(close(scores[2], 1.0));
    }

    #[test]
    fn concern_boost_is_uncapped_and_tunable() {
        let mut desired = DesiredEffects::default();
        desired.hair = effect_set(&[
            Effect::HairLossCare,
            Effect::ScalpSoothing,
            Effect::DandruffCare,
            Effect::DamageRepair,
            Effect::VolumeBoost,
        ]);
        let compatibility = HashMap::new();
        let context =
            ScoringContext { anchor_category: None, desired: &desired, compatibility: &compatibility };
        let weights = ScoringWeights { concern_boost_per_effect: 0.5, ..ScoringWeights::default() };

        let outcome = Scorer::new(weights)
            .score(&[candidate(1, Category::ScalpCare, 0.2, desired.hair.clone())], &context);

        assert!(close(outcome.scored[0].score, 0.2 * 3.5));
    }
}
