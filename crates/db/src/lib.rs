pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoAnchor, DemoCatalogSeed, SeedResult, VerificationResult, DEMO_ANCHORS};
pub use repositories::{
    InMemoryRecommendationCache, InMemoryRecommendationSource, RecommendationCache,
    RecommendationCacheKey, RepositoryError, SqlRecommendationCache, SqlRecommendationSource,
};
