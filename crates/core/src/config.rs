use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub recommendation: RecommendationConfig,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Tunables for one recommendation call. Built once at startup and shared
/// read-only with the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RecommendationConfig {
    /// Neighbor edges read per catalog-linked anchor.
    pub top_k_per_base: u32,
    /// Result size when the caller does not ask for one.
    pub final_limit: u32,
    pub max_final_limit: u32,
    pub max_top_k: u32,
    /// Share of the result taken deterministically from the top of the ranking.
    pub core_ratio: f64,
    pub max_per_brand: u32,
    pub weights: ScoringWeights,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringWeights {
    pub good_compatibility: f64,
    /// Added once per matched effect; the boost is not capped.
    pub concern_boost_per_effect: f64,
    pub same_category: f64,
    pub same_group: f64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub cache_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://carely.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                request_timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            recommendation: RecommendationConfig::default(),
            cache: CacheConfig { enabled: true, ttl_secs: 300 },
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_k_per_base: 50,
            final_limit: 10,
            max_final_limit: 50,
            max_top_k: 200,
            core_ratio: 0.30,
            max_per_brand: 2,
            weights: ScoringWeights::default(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            good_compatibility: 1.20,
            concern_boost_per_effect: 0.08,
            same_category: 1.10,
            same_group: 1.05,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("carely.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(request_timeout_secs) = server.request_timeout_secs {
                self.server.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(recommendation) = patch.recommendation {
            let target = &mut self.recommendation;
            if let Some(value) = recommendation.top_k_per_base {
                target.top_k_per_base = value;
            }
            if let Some(value) = recommendation.final_limit {
                target.final_limit = value;
            }
            if let Some(value) = recommendation.max_final_limit {
                target.max_final_limit = value;
            }
            if let Some(value) = recommendation.max_top_k {
                target.max_top_k = value;
            }
            if let Some(value) = recommendation.core_ratio {
                target.core_ratio = value;
            }
            if let Some(value) = recommendation.max_per_brand {
                target.max_per_brand = value;
            }
            if let Some(value) = recommendation.good_compatibility_weight {
                target.weights.good_compatibility = value;
            }
            if let Some(value) = recommendation.concern_boost_per_effect {
                target.weights.concern_boost_per_effect = value;
            }
            if let Some(value) = recommendation.same_category_bonus {
                target.weights.same_category = value;
            }
            if let Some(value) = recommendation.same_group_bonus {
                target.weights.same_group = value;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(enabled) = cache.enabled {
                self.cache.enabled = enabled;
            }
            if let Some(ttl_secs) = cache.ttl_secs {
                self.cache.ttl_secs = ttl_secs;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARELY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARELY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CARELY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARELY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARELY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARELY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARELY_SERVER_PORT") {
            self.server.port = parse_u16("CARELY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARELY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARELY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("CARELY_SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                parse_u64("CARELY_SERVER_REQUEST_TIMEOUT_SECS", &value)?;
        }

        let log_level = read_env("CARELY_LOGGING_LEVEL").or_else(|| read_env("CARELY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARELY_LOGGING_FORMAT").or_else(|| read_env("CARELY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        let recommendation = &mut self.recommendation;
        if let Some(value) = read_env("CARELY_RECOMMENDATION_TOP_K_PER_BASE") {
            recommendation.top_k_per_base =
                parse_u32("CARELY_RECOMMENDATION_TOP_K_PER_BASE", &value)?;
        }
        if let Some(value) = read_env("CARELY_RECOMMENDATION_FINAL_LIMIT") {
            recommendation.final_limit = parse_u32("CARELY_RECOMMENDATION_FINAL_LIMIT", &value)?;
        }
        if let Some(value) = read_env("CARELY_RECOMMENDATION_CORE_RATIO") {
            recommendation.core_ratio = parse_f64("CARELY_RECOMMENDATION_CORE_RATIO", &value)?;
        }
        if let Some(value) = read_env("CARELY_RECOMMENDATION_MAX_PER_BRAND") {
            recommendation.max_per_brand =
                parse_u32("CARELY_RECOMMENDATION_MAX_PER_BRAND", &value)?;
        }
        if let Some(value) = read_env("CARELY_RECOMMENDATION_CONCERN_BOOST_PER_EFFECT") {
            recommendation.weights.concern_boost_per_effect =
                parse_f64("CARELY_RECOMMENDATION_CONCERN_BOOST_PER_EFFECT", &value)?;
        }

        if let Some(value) = read_env("CARELY_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("CARELY_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARELY_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_u64("CARELY_CACHE_TTL_SECS", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_recommendation(&self.recommendation)?;
        validate_cache(&self.cache)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("carely.toml"), PathBuf::from("config/carely.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if server.request_timeout_secs == 0 || server.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "server.request_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_recommendation(recommendation: &RecommendationConfig) -> Result<(), ConfigError> {
    if recommendation.max_final_limit == 0 || recommendation.max_top_k == 0 {
        return Err(ConfigError::Validation(
            "recommendation.max_final_limit and recommendation.max_top_k must be greater than zero"
                .to_string(),
        ));
    }

    if recommendation.final_limit == 0
        || recommendation.final_limit > recommendation.max_final_limit
    {
        return Err(ConfigError::Validation(format!(
            "recommendation.final_limit must be in range 1..={}",
            recommendation.max_final_limit
        )));
    }

    if recommendation.top_k_per_base == 0 || recommendation.top_k_per_base > recommendation.max_top_k
    {
        return Err(ConfigError::Validation(format!(
            "recommendation.top_k_per_base must be in range 1..={}",
            recommendation.max_top_k
        )));
    }

    if !(0.0..=1.0).contains(&recommendation.core_ratio) {
        return Err(ConfigError::Validation(
            "recommendation.core_ratio must be in range 0.0..=1.0".to_string(),
        ));
    }

    if recommendation.max_per_brand == 0 {
        return Err(ConfigError::Validation(
            "recommendation.max_per_brand must be greater than zero".to_string(),
        ));
    }

    let weights = &recommendation.weights;
    let factors = [
        ("recommendation.good_compatibility_weight", weights.good_compatibility),
        ("recommendation.same_category_bonus", weights.same_category),
        ("recommendation.same_group_bonus", weights.same_group),
    ];
    for (name, value) in factors {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{name} must be a finite number greater than zero"
            )));
        }
    }
    if !weights.concern_boost_per_effect.is_finite() || weights.concern_boost_per_effect < 0.0 {
        return Err(ConfigError::Validation(
            "recommendation.concern_boost_per_effect must be a finite, non-negative number"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.enabled && cache.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.ttl_secs must be greater than zero when cache.enabled is true".to_string(),
        ));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    recommendation: Option<RecommendationPatch>,
    cache: Option<CachePatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    top_k_per_base: Option<u32>,
    final_limit: Option<u32>,
    max_final_limit: Option<u32>,
    max_top_k: Option<u32>,
    core_ratio: Option<f64>,
    max_per_brand: Option<u32>,
    good_compatibility_weight: Option<f64>,
    concern_boost_per_effect: Option<f64>,
    same_category_bonus: Option<f64>,
    same_group_bonus: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
}
