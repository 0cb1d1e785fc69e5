use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use carely_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in effective_fields(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

/// `(file key path, rendered value, env keys in lookup order)`.
fn effective_fields(config: &AppConfig) -> Vec<(&'static str, String, &'static [&'static str])> {
    let recommendation = &config.recommendation;
    let weights = &recommendation.weights;

    vec![
        field("database.url", config.database.url.clone(), &["CARELY_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CARELY_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CARELY_DATABASE_TIMEOUT_SECS"],
        ),
        field("server.bind_address", config.server.bind_address.clone(), &["CARELY_SERVER_BIND_ADDRESS"]),
        field("server.port", config.server.port.to_string(), &["CARELY_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["CARELY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "server.request_timeout_secs",
            config.server.request_timeout_secs.to_string(),
            &["CARELY_SERVER_REQUEST_TIMEOUT_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["CARELY_LOGGING_LEVEL", "CARELY_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["CARELY_LOGGING_FORMAT", "CARELY_LOG_FORMAT"],
        ),
        field(
            "recommendation.top_k_per_base",
            recommendation.top_k_per_base.to_string(),
            &["CARELY_RECOMMENDATION_TOP_K_PER_BASE"],
        ),
        field(
            "recommendation.final_limit",
            recommendation.final_limit.to_string(),
            &["CARELY_RECOMMENDATION_FINAL_LIMIT"],
        ),
        field("recommendation.max_final_limit", recommendation.max_final_limit.to_string(), &[]),
        field("recommendation.max_top_k", recommendation.max_top_k.to_string(), &[]),
        field(
            "recommendation.core_ratio",
            recommendation.core_ratio.to_string(),
            &["CARELY_RECOMMENDATION_CORE_RATIO"],
        ),
        field(
            "recommendation.max_per_brand",
            recommendation.max_per_brand.to_string(),
            &["CARELY_RECOMMENDATION_MAX_PER_BRAND"],
        ),
        field("recommendation.good_compatibility_weight", weights.good_compatibility.to_string(), &[]),
        field(
            "recommendation.concern_boost_per_effect",
            weights.concern_boost_per_effect.to_string(),
            &["CARELY_RECOMMENDATION_CONCERN_BOOST_PER_EFFECT"],
        ),
        field("recommendation.same_category_bonus", weights.same_category.to_string(), &[]),
        field("recommendation.same_group_bonus", weights.same_group.to_string(), &[]),
        field("cache.enabled", config.cache.enabled.to_string(), &["CARELY_CACHE_ENABLED"]),
        field("cache.ttl_secs", config.cache.ttl_secs.to_string(), &["CARELY_CACHE_TTL_SECS"]),
    ]
}

fn field(
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key_path, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("carely.toml"), PathBuf::from("config/carely.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
