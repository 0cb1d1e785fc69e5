use serde::{Deserialize, Serialize};

use super::member::MemberId;
use super::product::ProductId;
use crate::taxonomy::Category;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub i64);

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A product a member owns or tracks, used to seed recommendations.
///
/// Catalog-linked anchors carry a `product_id`; free-text anchors do not and may
/// or may not have a category set by the member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorItem {
    pub id: AnchorId,
    pub member_id: MemberId,
    pub product_id: Option<ProductId>,
    pub category: Option<Category>,
    pub name: String,
}
