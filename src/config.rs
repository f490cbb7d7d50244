//! Configuration management for the `cep-weather` services
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::CepWeatherError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure shared by the relay and the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CepWeatherConfig {
    /// Listen addresses
    #[serde(default)]
    pub server: ServerConfig,
    /// Front hop settings
    #[serde(default)]
    pub relay: RelayConfig,
    /// Internal hop settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Postal code directory (ViaCEP) settings
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Weather provider (WeatherAPI) settings
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Trace export configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the relay listens on
    #[serde(default = "default_relay_bind")]
    pub relay_bind: String,
    /// Address the pipeline listens on
    #[serde(default = "default_pipeline_bind")]
    pub pipeline_bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the pipeline service
    #[serde(default = "default_pipeline_url")]
    pub pipeline_url: String,
    /// Budget for a whole client request, including the forwarded hop
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for one lookup; a shorter inbound budget wins
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL for the postal code directory
    #[serde(default = "default_directory_base_url")]
    pub base_url: String,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Weather API key (required by the pipeline)
    pub api_key: Option<String>,
    /// Base URL for weather API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP/HTTP traces endpoint, e.g. `http://otel-collector:4318/v1/traces`.
    /// Spans are only exported when this is set.
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_relay_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_pipeline_bind() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_pipeline_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_request_timeout() -> u32 {
    10
}

fn default_directory_base_url() -> String {
    "https://viacep.com.br".to_string()
}

fn default_weather_base_url() -> String {
    "https://api.weatherapi.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            relay_bind: default_relay_bind(),
            pipeline_bind: default_pipeline_bind(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pipeline_url: default_pipeline_url(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_directory_base_url(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
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

impl Default for CepWeatherConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            relay: RelayConfig::default(),
            pipeline: PipelineConfig::default(),
            directory: DirectoryConfig::default(),
            weather: WeatherConfig::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl CepWeatherConfig {
    /// Load configuration from `config_path`, or the default location when
    /// `None`, then apply environment overrides
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

        // CEPWEATHER_WEATHER__API_KEY -> weather.api_key
        builder = builder.add_source(
            Environment::with_prefix("CEPWEATHER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: CepWeatherConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cep-weather").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.relay_bind.is_empty() {
            self.server.relay_bind = default_relay_bind();
        }
        if self.server.pipeline_bind.is_empty() {
            self.server.pipeline_bind = default_pipeline_bind();
        }
        if self.relay.pipeline_url.is_empty() {
            self.relay.pipeline_url = default_pipeline_url();
        }
        if self.relay.timeout_seconds == 0 {
            self.relay.timeout_seconds = default_request_timeout();
        }
        if self.pipeline.timeout_seconds == 0 {
            self.pipeline.timeout_seconds = default_request_timeout();
        }
        if self.directory.base_url.is_empty() {
            self.directory.base_url = default_directory_base_url();
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
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
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// The pipeline cannot call the weather provider without a key
    pub fn require_weather_api_key(&self) -> crate::Result<&str> {
        match self.weather.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(CepWeatherError::config(
                "weather.api_key is required to run the pipeline (set CEPWEATHER_WEATHER__API_KEY)",
            )),
        }
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.weather.api_key {
            if api_key.is_empty() {
                return Err(CepWeatherError::config(
                    "Weather API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.chars().any(char::is_whitespace) {
                return Err(CepWeatherError::config(
                    "Weather API key must not contain whitespace. Please check your API key.",
                )
                .into());
            }

            if api_key.len() > 100 {
                return Err(CepWeatherError::config(
                    "Weather API key appears to be invalid (too long). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.relay.timeout_seconds > 300 {
            return Err(CepWeatherError::config("Relay timeout cannot exceed 300 seconds").into());
        }

        if self.pipeline.timeout_seconds > 300 {
            return Err(
                CepWeatherError::config("Pipeline timeout cannot exceed 300 seconds").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(CepWeatherError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(CepWeatherError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("relay.pipeline_url", &self.relay.pipeline_url),
            ("directory.base_url", &self.directory.base_url),
            ("weather.base_url", &self.weather.base_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CepWeatherError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if let Some(endpoint) = &self.telemetry.otlp_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(CepWeatherError::config(
                    "telemetry.otlp_endpoint must be a valid HTTP or HTTPS URL",
                )
                .into());
            }
        }

        Ok(())
    }
}
