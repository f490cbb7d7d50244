//! Data models for the `cep-weather` services
//!
//! This module contains the request-scoped domain models organized by concern:
//! - Cep: the validated postal code identifier
//! - Location: the locality record resolved from a postal code
//! - Weather: current conditions, unit conversion and the enriched result

pub mod cep;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use cep::{CEP_LENGTH, Cep, InvalidShape};
pub use location::LocalityRecord;
pub use weather::{EnrichedResult, Temperatures, WeatherSnapshot};
