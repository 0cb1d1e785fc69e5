use std::collections::BTreeSet;

use crate::domain::member::ConcernFlags;
use crate::taxonomy::{
    hair_concern_effects, health_concern_effects, skin_concern_effects, DomainGroup, EffectId,
};

/// Effects a member is looking for, split by domain group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredEffects {
    pub skin: BTreeSet<EffectId>,
    pub hair: BTreeSet<EffectId>,
    pub health: BTreeSet<EffectId>,
}

impl DesiredEffects {
    pub fn resolve(flags: &ConcernFlags) -> Self {
        let skin = flags
            .skin
            .iter()
            .flat_map(|concern| skin_concern_effects(*concern))
            .map(|effect| effect.id())
            .collect();
        let hair = flags
            .hair
            .iter()
            .flat_map(|concern| hair_concern_effects(*concern))
            .map(|effect| effect.id())
            .collect();
        let health = flags
            .health
            .iter()
            .flat_map(|concern| health_concern_effects(*concern))
            .map(|effect| effect.id())
            .collect();

        Self { skin, hair, health }
    }

    pub fn for_group(&self, group: DomainGroup) -> &BTreeSet<EffectId> {
        match group {
            DomainGroup::Skin => &self.skin,
            DomainGroup::Hair => &self.hair,
            DomainGroup::Health => &self.health,
        }
    }

    pub fn union(&self) -> BTreeSet<EffectId> {
        self.skin.iter().chain(&self.hair).chain(&self.health).copied().collect()
    }

    /// The set an external anchor is compared against: its own group when known,
    /// every group otherwise.
    pub fn for_anchor(&self, group: Option<DomainGroup>) -> BTreeSet<EffectId> {
        match group {
            Some(group) => self.for_group(group).clone(),
            None => self.union(),
        }
    }
}
