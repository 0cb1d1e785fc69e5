//! Static vocabulary shared by the catalog and the recommendation pipeline.
//!
//! Categories are addressed by a stable integer code in storage and belong to
//! exactly one [`DomainGroup`]. Effects are a small integer vocabulary used to
//! tag products and to express what a member's concerns call for.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::member::{HairConcern, HealthConcern, SkinConcern};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainGroup {
    Skin,
    Hair,
    Health,
}

impl DomainGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skin => "skin",
            Self::Hair => "hair",
            Self::Health => "health",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cleanser,
    Toner,
    Serum,
    Moisturizer,
    Sunscreen,
    Mask,
    Shampoo,
    Conditioner,
    HairTreatment,
    ScalpCare,
    Multivitamin,
    Probiotic,
    Collagen,
    SleepSupport,
}

/// `(category, storage code, domain group)`; codes are contiguous per group.
const CATEGORY_TABLE: &[(Category, i64, DomainGroup)] = &[
    (Category::Cleanser, 1, DomainGroup::Skin),
    (Category::Toner, 2, DomainGroup::Skin),
    (Category::Serum, 3, DomainGroup::Skin),
    (Category::Moisturizer, 4, DomainGroup::Skin),
    (Category::Sunscreen, 5, DomainGroup::Skin),
    (Category::Mask, 6, DomainGroup::Skin),
    (Category::Shampoo, 11, DomainGroup::Hair),
    (Category::Conditioner, 12, DomainGroup::Hair),
    (Category::HairTreatment, 13, DomainGroup::Hair),
    (Category::ScalpCare, 14, DomainGroup::Hair),
    (Category::Multivitamin, 21, DomainGroup::Health),
    (Category::Probiotic, 22, DomainGroup::Health),
    (Category::Collagen, 23, DomainGroup::Health),
    (Category::SleepSupport, 24, DomainGroup::Health),
];

impl Category {
    pub fn from_code(code: i64) -> Option<Self> {
        CATEGORY_TABLE.iter().find(|(_, entry_code, _)| *entry_code == code).map(|(c, _, _)| *c)
    }

    pub fn code(&self) -> i64 {
        self.entry().1
    }

    pub fn group(&self) -> DomainGroup {
        self.entry().2
    }

    pub fn all() -> impl Iterator<Item = Category> {
        CATEGORY_TABLE.iter().map(|(category, _, _)| *category)
    }

    fn entry(&self) -> &'static (Category, i64, DomainGroup) {
        // Every variant has a row; the table test guards this.
        CATEGORY_TABLE
            .iter()
            .find(|(category, _, _)| category == self)
            .unwrap_or(&CATEGORY_TABLE[0])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Effect {
    Moisturizing = 1,
    Soothing = 2,
    AcneRelief = 3,
    Brightening = 4,
    AntiAging = 5,
    PoreCare = 6,
    OilControl = 7,
    SunProtection = 8,
    Exfoliating = 9,
    BarrierRepair = 10,
    ScalpSoothing = 11,
    HairLossCare = 12,
    DandruffCare = 13,
    DamageRepair = 14,
    VolumeBoost = 15,
    AntioxidantSupport = 16,
    GutHealth = 17,
    ImmuneSupport = 18,
    EnergySupport = 19,
    JointSupport = 20,
}

impl Effect {
    pub fn id(self) -> EffectId {
        EffectId(self as u16)
    }
}

impl From<Effect> for EffectId {
    fn from(effect: Effect) -> Self {
        effect.id()
    }
}

pub fn skin_concern_effects(concern: SkinConcern) -> &'static [Effect] {
    match concern {
        SkinConcern::Acne => &[Effect::AcneRelief, Effect::Soothing],
        SkinConcern::Dryness => &[Effect::Moisturizing, Effect::BarrierRepair],
        SkinConcern::Oiliness => &[Effect::OilControl, Effect::PoreCare],
        SkinConcern::Sensitivity => &[Effect::Soothing, Effect::BarrierRepair],
        SkinConcern::Wrinkles => &[Effect::AntiAging],
        SkinConcern::Pigmentation => &[Effect::Brightening, Effect::SunProtection],
        SkinConcern::Pores => &[Effect::PoreCare, Effect::Exfoliating],
        SkinConcern::Dullness => &[Effect::Brightening, Effect::Exfoliating],
    }
}

pub fn hair_concern_effects(concern: HairConcern) -> &'static [Effect] {
    match concern {
        HairConcern::HairLoss => &[Effect::HairLossCare, Effect::ScalpSoothing],
        HairConcern::Dandruff => &[Effect::DandruffCare, Effect::ScalpSoothing],
        HairConcern::Damage => &[Effect::DamageRepair],
        HairConcern::OilyScalp => &[Effect::OilControl, Effect::ScalpSoothing],
        HairConcern::Thinning => &[Effect::VolumeBoost, Effect::HairLossCare],
        HairConcern::Frizz => &[],
    }
}

pub fn health_concern_effects(concern: HealthConcern) -> &'static [Effect] {
    match concern {
        HealthConcern::SleepStress => &[Effect::AntioxidantSupport],
        HealthConcern::Fatigue => &[Effect::EnergySupport],
        HealthConcern::Digestion => &[Effect::GutHealth],
        HealthConcern::Immunity => &[Effect::ImmuneSupport, Effect::AntioxidantSupport],
        HealthConcern::JointCare => &[Effect::JointSupport],
        HealthConcern::SkinHealth => &[Effect::AntioxidantSupport, Effect::Moisturizing],
    }
}

pub fn effect_set(effects: &[Effect]) -> BTreeSet<EffectId> {
    effects.iter().map(|effect| effect.id()).collect()
}
