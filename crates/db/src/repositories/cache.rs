use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use carely_core::domain::anchor::AnchorId;
use carely_core::domain::member::MemberId;
use carely_core::recommend::RecommendationResponse;

use super::{RecommendationCache, RepositoryError};
use crate::DbPool;

/// Identifies one cached response: the same anchor, member and effective
/// bounds always map to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecommendationCacheKey {
    pub anchor_id: AnchorId,
    pub member_id: MemberId,
    pub top_k: u32,
    pub limit: u32,
}

impl RecommendationCacheKey {
    pub fn new(anchor_id: AnchorId, member_id: MemberId, top_k: u32, limit: u32) -> Self {
        Self { anchor_id, member_id, top_k, limit }
    }
}

impl fmt::Display for RecommendationCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec:{}:{}:{}:{}", self.anchor_id, self.member_id, self.top_k, self.limit)
    }
}

pub(crate) fn expires_at(now: i64, ttl: Duration) -> i64 {
    now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

pub struct SqlRecommendationCache {
    pool: DbPool,
}

impl SqlRecommendationCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecommendationCache for SqlRecommendationCache {
    async fn get(
        &self,
        key: &RecommendationCacheKey,
    ) -> Result<Option<RecommendationResponse>, RepositoryError> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload_json FROM recommendation_cache WHERE cache_key = ?1 AND expires_at > ?2",
        )
        .bind(key.to_string())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        payload
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .transpose()
    }

    async fn put(
        &self,
        key: &RecommendationCacheKey,
        response: &RecommendationResponse,
        ttl: Duration,
    ) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(response).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recommendation_cache WHERE expires_at <= ?1")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO recommendation_cache (cache_key, payload_json, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cache_key) DO UPDATE SET
                payload_json = excluded.payload_json,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
        )
        .bind(key.to_string())
        .bind(payload)
        .bind(now)
        .bind(expires_at(now, ttl))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM recommendation_cache WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
