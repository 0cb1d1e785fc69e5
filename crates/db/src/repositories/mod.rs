use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use carely_core::errors::ApplicationError;
use carely_core::recommend::RecommendationResponse;

pub mod cache;
pub mod catalog;
pub mod memory;

pub use cache::{RecommendationCacheKey, SqlRecommendationCache};
pub use catalog::SqlRecommendationSource;
pub use memory::{InMemoryRecommendationCache, InMemoryRecommendationSource};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Short-lived store of fully assembled responses keyed by request shape.
#[async_trait]
pub trait RecommendationCache: Send + Sync {
    /// Returns a live entry; expired entries read as a miss.
    async fn get(
        &self,
        key: &RecommendationCacheKey,
    ) -> Result<Option<RecommendationResponse>, RepositoryError>;

    async fn put(
        &self,
        key: &RecommendationCacheKey,
        response: &RecommendationResponse,
        ttl: Duration,
    ) -> Result<(), RepositoryError>;

    /// Drops expired entries and reports how many were removed.
    async fn purge_expired(&self) -> Result<u64, RepositoryError>;
}

/// Ids bound per `IN (...)` query; SQLite caps host parameters per statement.
pub(crate) const IDS_PER_QUERY: usize = 500;

/// `?first, ?first+1, ...` for a dynamic `IN (...)` list of `count` values.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count).map(|index| format!("?{index}")).collect::<Vec<_>>().join(", ")
}
