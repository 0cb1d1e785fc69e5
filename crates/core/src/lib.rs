pub mod config;
pub mod domain;
pub mod errors;
pub mod recommend;
pub mod taxonomy;

pub use config::{AppConfig, RecommendationConfig, ScoringWeights};
pub use domain::anchor::{AnchorId, AnchorItem};
pub use domain::member::{ConcernFlags, MemberId, MemberProfile, SkinType};
pub use domain::product::{CatalogProduct, NeighborEdge, ProductId, SkinCompatibility};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use recommend::{
    EngineCounters, PoolMode, RecommendationEngine, RecommendationRequest, RecommendationResponse,
    RecommendationSource, RecommendedProduct,
};
pub use taxonomy::{Category, DomainGroup, Effect, EffectId};
