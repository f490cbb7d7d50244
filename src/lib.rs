//! `cep-weather` - current weather for a Brazilian postal code
//!
//! Two services: a validating relay that clients talk to, and a lookup
//! pipeline that resolves the postal code through ViaCEP, fetches the current
//! temperature from WeatherAPI and reports it in Celsius, Fahrenheit and
//! Kelvin. Trace context, deadline and cancellation follow every request
//! across both hops.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod http_client;
pub mod location_resolver;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod service;
pub mod telemetry;
pub mod upstream;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use config::CepWeatherConfig;
pub use context::{RequestContext, TracePropagator};
pub use error::CepWeatherError;
pub use location_resolver::{LocalityResolver, ViaCepResolver};
pub use models::{Cep, EnrichedResult, LocalityRecord, Temperatures, WeatherSnapshot};
pub use pipeline::{AggregationPipeline, PipelineError};
pub use relay::{RelayError, RequestRelay};
pub use upstream::{FetchError, ResolveError, UpstreamError};
pub use weather::{WeatherApiFetcher, WeatherFetcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, CepWeatherError>;
