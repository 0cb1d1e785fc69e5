use std::sync::Arc;

use carely_core::domain::anchor::AnchorId;
use carely_core::domain::member::MemberId;
use carely_core::errors::ApplicationError;
use carely_core::recommend::{RecommendationEngine, RecommendationRequest};
use carely_db::SqlRecommendationSource;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::commands::{build_runtime, connect, load_config, CommandResult, Failure};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecommendArgs {
    pub member_id: i64,
    pub anchor_id: i64,
    pub limit: Option<u32>,
    pub top_k: Option<u32>,
    /// Fixed sampling seed; entropy when absent.
    pub seed: Option<u64>,
}

pub fn run(args: RecommendArgs) -> CommandResult {
    let config = match load_config("recommend") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("recommend") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        let source = Arc::new(SqlRecommendationSource::new(pool.clone()));
        let engine = RecommendationEngine::new(source, config.recommendation.clone());

        let mut request =
            RecommendationRequest::new(AnchorId(args.anchor_id), MemberId(args.member_id));
        if let Some(limit) = args.limit {
            request = request.with_limit(limit);
        }
        if let Some(top_k) = args.top_k {
            request = request.with_top_k(top_k);
        }

        let outcome = match args.seed {
            Some(seed) => engine.recommend_with_rng(&request, &mut StdRng::seed_from_u64(seed)).await,
            None => engine.recommend(&request).await,
        };
        pool.close().await;
        outcome.map_err(classify)
    });

    match result {
        Ok(response) => {
            let message = format!(
                "{} recommendations for anchor {} ({:?} pool)",
                response.items.len(),
                response.anchor_id,
                response.mode
            );
            with_data(message, &response)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recommend", error_class, message, exit_code)
        }
    }
}

fn with_data<T: Serialize>(message: String, data: &T) -> CommandResult {
    match serde_json::to_value(data) {
        Ok(value) => CommandResult::success_with_data("recommend", message, Some(value)),
        Err(error) => CommandResult::failure(
            "recommend",
            "output_serialization",
            format!("could not serialize recommendations: {error}"),
            3,
        ),
    }
}

fn classify(error: ApplicationError) -> Failure {
    match error {
        ApplicationError::Domain(domain) => ("recommendation_rejected", domain.to_string(), 6u8),
        ApplicationError::Persistence(message) => ("db_query", message, 4u8),
        ApplicationError::Configuration(message) => ("config_validation", message, 2u8),
    }
}
