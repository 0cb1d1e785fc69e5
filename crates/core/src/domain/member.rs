use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinType {
    Dry,
    Oily,
    Combination,
    Normal,
    Sensitive,
}

impl SkinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "dry",
            Self::Oily => "oily",
            Self::Combination => "combination",
            Self::Normal => "normal",
            Self::Sensitive => "sensitive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dry" => Some(Self::Dry),
            "oily" => Some(Self::Oily),
            "combination" => Some(Self::Combination),
            "normal" => Some(Self::Normal),
            "sensitive" => Some(Self::Sensitive),
            _ => None,
        }
    }
}

macro_rules! concern_codes {
    ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

concern_codes!(SkinConcern {
    Acne => "acne",
    Dryness => "dryness",
    Oiliness => "oiliness",
    Sensitivity => "sensitivity",
    Wrinkles => "wrinkles",
    Pigmentation => "pigmentation",
    Pores => "pores",
    Dullness => "dullness",
});

concern_codes!(HairConcern {
    HairLoss => "hair_loss",
    Dandruff => "dandruff",
    Damage => "damage",
    OilyScalp => "oily_scalp",
    Thinning => "thinning",
    Frizz => "frizz",
});

concern_codes!(HealthConcern {
    SleepStress => "sleep_stress",
    Fatigue => "fatigue",
    Digestion => "digestion",
    Immunity => "immunity",
    JointCare => "joint_care",
    SkinHealth => "skin_health",
});

/// Concern flags a member has switched on, per domain group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcernFlags {
    pub skin: BTreeSet<SkinConcern>,
    pub hair: BTreeSet<HairConcern>,
    pub health: BTreeSet<HealthConcern>,
}

impl ConcernFlags {
    pub fn is_empty(&self) -> bool {
        self.skin.is_empty() && self.hair.is_empty() && self.health.is_empty()
    }

    /// Records a stored `(domain, code)` flag. Returns `false` for unknown pairs.
    pub fn insert_code(&mut self, domain: &str, code: &str) -> bool {
        match domain {
            "skin" => SkinConcern::parse(code).map(|c| self.skin.insert(c)).is_some(),
            "hair" => HairConcern::parse(code).map(|c| self.hair.insert(c)).is_some(),
            "health" => HealthConcern::parse(code).map(|c| self.health.insert(c)).is_some(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub skin_type: Option<SkinType>,
    pub concerns: ConcernFlags,
}
