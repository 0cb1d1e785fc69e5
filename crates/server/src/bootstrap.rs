use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use carely_core::config::{AppConfig, ConfigError, LoadOptions};
use carely_core::recommend::RecommendationEngine;
use carely_db::{
    connect_with_settings, migrations, DbPool, RecommendationCache, SqlRecommendationCache,
    SqlRecommendationSource,
};
use thiserror::Error;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::health::{self, HealthState};
use crate::recommendations::{self, RecommendationState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<RecommendationEngine>,
    pub cache: Option<Arc<dyn RecommendationCache>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let source = Arc::new(SqlRecommendationSource::new(db_pool.clone()));
    let engine = Arc::new(RecommendationEngine::new(source, config.recommendation.clone()));
    let cache: Option<Arc<dyn RecommendationCache>> = config
        .cache
        .enabled
        .then(|| Arc::new(SqlRecommendationCache::new(db_pool.clone())) as Arc<dyn RecommendationCache>);

    Ok(Application { config, db_pool, engine, cache })
}

impl Application {
    /// Full HTTP surface with tracing and the request timeout applied.
    pub fn router(&self) -> Router {
        let health = health::router(HealthState {
            db_pool: self.db_pool.clone(),
            counters: self.engine.counters(),
        });
        let recommendations = recommendations::router(RecommendationState {
            engine: Arc::clone(&self.engine),
            cache: self.cache.clone(),
            cache_ttl: Duration::from_secs(self.config.cache.ttl_secs),
        });

        Router::new()
            .merge(health)
            .merge(recommendations)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }
}
