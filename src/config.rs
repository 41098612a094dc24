//! Configuration management for the weather playlist service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::resilience::{BreakerConfig, RetryPolicy};

/// Prefix of every environment override, e.g. `WEATHER_PLAYLIST_WEATHER__API_KEY`
pub const ENV_PREFIX: &str = "WEATHER_PLAYLIST";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Provider API key
    pub api_key: Option<String>,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub timeout_seconds: u32,
}

/// Music catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_catalog_base_url")]
    pub api_base_url: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub timeout_seconds: u32,
    /// Tracks requested per search
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

/// Breaker and retry settings per provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub weather: StagePolicyConfig,
    #[serde(default)]
    pub catalog: StagePolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePolicyConfig {
    /// Attempts per call, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: usize,
    /// Failure percentage that opens the breaker
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    #[serde(default = "default_open_seconds")]
    pub open_seconds: u64,
    #[serde(default = "default_half_open_probes")]
    pub half_open_probes: usize,
}

/// Whole-run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for one pipeline run, 0 disables it
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u32,
}

/// Request history storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// `memory` or `disk`
    #[serde(default = "default_history_backend")]
    pub backend: String,
    /// Database directory for the disk backend, empty means the data dir
    #[serde(default)]
    pub path: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Trace export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP/HTTP endpoint, export is off when unset
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_catalog_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_call_timeout() -> u32 {
    5
}

fn default_search_limit() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_window_size() -> usize {
    10
}

fn default_minimum_calls() -> usize {
    3
}

fn default_failure_rate_threshold() -> f64 {
    50.0
}

fn default_open_seconds() -> u64 {
    30
}

fn default_half_open_probes() -> usize {
    1
}

fn default_deadline_seconds() -> u32 {
    30
}

fn default_history_backend() -> String {
    "memory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_service_name() -> String {
    "weather-playlist".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_seconds: default_call_timeout(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_token_url(),
            api_base_url: default_catalog_base_url(),
            timeout_seconds: default_call_timeout(),
            search_limit: default_search_limit(),
        }
    }
}

impl Default for StagePolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            window_size: default_window_size(),
            minimum_calls: default_minimum_calls(),
            failure_rate_threshold: default_failure_rate_threshold(),
            open_seconds: default_open_seconds(),
            half_open_probes: default_half_open_probes(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: default_deadline_seconds(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

impl StagePolicyConfig {
    #[must_use]
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            window_size: self.window_size,
            minimum_calls: self.minimum_calls,
            failure_rate_threshold: self.failure_rate_threshold,
            open_duration: Duration::from_secs(self.open_seconds),
            half_open_probes: self.half_open_probes,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.min_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    fn validate(&self, provider: &str) -> Result<()> {
        if !(1..=10).contains(&self.max_attempts) {
            anyhow::bail!("{provider} max attempts must be between 1 and 10");
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            anyhow::bail!("{provider} min backoff cannot exceed max backoff");
        }
        if self.max_backoff_ms > 60_000 {
            anyhow::bail!("{provider} max backoff cannot exceed 60000 ms");
        }
        if self.window_size == 0 || self.window_size > 1000 {
            anyhow::bail!("{provider} breaker window size must be between 1 and 1000");
        }
        if self.minimum_calls == 0 || self.minimum_calls > self.window_size {
            anyhow::bail!("{provider} breaker minimum calls must be between 1 and the window size");
        }
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            anyhow::bail!("{provider} breaker failure rate threshold must be in (0, 100]");
        }
        if !(1..=3600).contains(&self.open_seconds) {
            anyhow::bail!("{provider} breaker open duration must be between 1 and 3600 seconds");
        }
        if self.half_open_probes == 0 {
            anyhow::bail!("{provider} breaker needs at least one half-open probe");
        }
        Ok(())
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_seconds > 0).then(|| Duration::from_secs(self.deadline_seconds.into()))
    }
}

impl AppConfig {
    /// Load configuration from the default file location and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weather-playlist").join("config.toml"))
    }

    /// Directory used by the disk history backend when no path is configured
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        if self.history.path.is_empty() {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("weather-playlist")
                .join("history")
        } else {
            PathBuf::from(&self.history.path)
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_call_timeout();
        }
        if self.catalog.token_url.is_empty() {
            self.catalog.token_url = default_token_url();
        }
        if self.catalog.api_base_url.is_empty() {
            self.catalog.api_base_url = default_catalog_base_url();
        }
        if self.catalog.timeout_seconds == 0 {
            self.catalog.timeout_seconds = default_call_timeout();
        }
        if self.catalog.search_limit == 0 {
            self.catalog.search_limit = default_search_limit();
        }
        if self.history.backend.is_empty() {
            self.history.backend = default_history_backend();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.resilience.weather.validate("Weather")?;
        self.resilience.catalog.validate("Catalog")?;
        Ok(())
    }

    /// Credentials are optional while loading but required to serve requests
    pub fn require_credentials(&self) -> Result<()> {
        let missing = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

        if missing(&self.weather.api_key) {
            anyhow::bail!("Weather API key is missing. Set {ENV_PREFIX}_WEATHER__API_KEY");
        }
        if missing(&self.catalog.client_id) || missing(&self.catalog.client_secret) {
            anyhow::bail!(
                "Catalog credentials are missing. \
                 Set {ENV_PREFIX}_CATALOG__CLIENT_ID and {ENV_PREFIX}_CATALOG__CLIENT_SECRET"
            );
        }
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if !(1..=60).contains(&self.weather.timeout_seconds) {
            anyhow::bail!("Weather API timeout must be between 1 and 60 seconds");
        }
        if !(1..=60).contains(&self.catalog.timeout_seconds) {
            anyhow::bail!("Catalog API timeout must be between 1 and 60 seconds");
        }
        if !(1..=50).contains(&self.catalog.search_limit) {
            anyhow::bail!("Catalog search limit must be between 1 and 50");
        }
        if self.pipeline.deadline_seconds > 300 {
            anyhow::bail!("Pipeline deadline cannot exceed 300 seconds");
        }
        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            );
        }

        let valid_backends = ["memory", "disk"];
        if !valid_backends.contains(&self.history.backend.as_str()) {
            anyhow::bail!(
                "Invalid history backend '{}'. Must be one of: {}",
                self.history.backend,
                valid_backends.join(", ")
            );
        }

        for (name, url) in [
            ("Weather API base URL", &self.weather.base_url),
            ("Catalog token URL", &self.catalog.token_url),
            ("Catalog API base URL", &self.catalog.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{name} must be a valid HTTP or HTTPS URL");
            }
        }

        Ok(())
    }
}
