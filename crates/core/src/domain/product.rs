use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::taxonomy::Category;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog row as read for a single recommendation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub category: Category,
    pub brand: String,
    pub name: String,
    pub price: Decimal,
    /// Discount in percent (`0..=100`).
    pub discount_rate: Decimal,
    pub stock: i64,
    pub active: bool,
    pub thumbnail: Option<String>,
}

impl CatalogProduct {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn discount_price(&self) -> Decimal {
        let rate = self.discount_rate.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        (self.price * (Decimal::ONE_HUNDRED - rate) / Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Precomputed nearest-neighbor relation between two catalog products.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub base_product_id: ProductId,
    pub neighbor_product_id: ProductId,
    pub sim_overall: f64,
    /// 1 is the closest neighbor.
    pub rank_order: u32,
}

/// Tri-state skin compatibility of a product for one skin type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinCompatibility {
    Good,
    Neutral,
    Incompatible,
}

impl SkinCompatibility {
    pub fn from_flag(flag: i64) -> Self {
        match flag.signum() {
            1 => Self::Good,
            -1 => Self::Incompatible,
            _ => Self::Neutral,
        }
    }

    pub fn as_flag(&self) -> i64 {
        match self {
            Self::Good => 1,
            Self::Neutral => 0,
            Self::Incompatible => -1,
        }
    }
}
