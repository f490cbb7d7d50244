//! Error types for bootstrapping the `cep-weather` services
//!
//! Per-request failures live next to the stage that produces them
//! ([`crate::upstream`], [`crate::pipeline`], [`crate::relay`]); this type only
//! covers what can go wrong before a service starts accepting requests.

use thiserror::Error;

/// Main error type for process-level failures
#[derive(Error, Debug)]
pub enum CepWeatherError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Telemetry pipeline setup errors
    #[error("Telemetry error: {message}")]
    Telemetry { message: String },

    /// HTTP client construction errors
    #[error("HTTP client error: {message}")]
    Client { message: String },

    /// Server bind/serve errors
    #[error("Server error: {message}")]
    Server { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CepWeatherError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new telemetry error
    pub fn telemetry<S: Into<String>>(message: S) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    /// Create a new HTTP client error
    pub fn client<S: Into<String>>(message: S) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CepWeatherError::Config { message } => {
                format!(
                    "Configuration error: {message}. Please check your config file and environment."
                )
            }
            CepWeatherError::Telemetry { .. } => {
                "Unable to set up tracing export. Check the OTLP endpoint.".to_string()
            }
            CepWeatherError::Client { .. } => {
                "Unable to build the outbound HTTP client.".to_string()
            }
            CepWeatherError::Server { message } => format!("Server failed: {message}"),
            CepWeatherError::Io { .. } => {
                "I/O operation failed. Is the listen address already in use?".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = CepWeatherError::config("missing API key");
        assert!(matches!(config_err, CepWeatherError::Config { .. }));

        let telemetry_err = CepWeatherError::telemetry("exporter failed");
        assert!(matches!(telemetry_err, CepWeatherError::Telemetry { .. }));

        let server_err = CepWeatherError::server("bind failed");
        assert!(matches!(server_err, CepWeatherError::Server { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = CepWeatherError::config("weather.api_key is required");
        assert!(config_err.user_message().contains("weather.api_key is required"));

        let client_err = CepWeatherError::client("tls backend");
        assert!(client_err.user_message().contains("HTTP client"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: CepWeatherError = io_err.into();
        assert!(matches!(err, CepWeatherError::Io { .. }));
    }
}
