//! Weather snapshot, unit conversion and the enriched response

use serde::{Deserialize, Serialize};

/// Current conditions for a locality. Only `temp_c` drives the response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Temperature in Celsius
    pub temp_c: f64,
    /// Relative humidity in percent
    pub humidity: Option<u8>,
    /// Wind speed in km/h
    pub wind_kph: Option<f64>,
    /// Human-readable condition, e.g. "Partly cloudy"
    pub condition: Option<String>,
    /// Location name as the provider understood the query
    pub location_name: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl WeatherSnapshot {
    #[must_use]
    pub fn new(temp_c: f64) -> Self {
        Self {
            temp_c,
            humidity: None,
            wind_kph: None,
            condition: None,
            location_name: None,
            region: None,
            country: None,
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temp_c)
    }
}

/// One temperature expressed in three scales
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperatures {
    pub celsius: f64,
    pub fahrenheit: f64,
    pub kelvin: f64,
}

impl Temperatures {
    /// Offset used for Kelvin. Kept at 273 (not 273.15) to match the
    /// responses existing clients already compare against.
    pub const KELVIN_OFFSET: f64 = 273.0;

    #[must_use]
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius * 1.8 + 32.0,
            kelvin: celsius + Self::KELVIN_OFFSET,
        }
    }
}

/// Body returned to clients on success
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EnrichedResult {
    pub city: String,
    #[serde(rename = "temp_C")]
    pub temp_c: f64,
    #[serde(rename = "temp_F")]
    pub temp_f: f64,
    #[serde(rename = "temp_K")]
    pub temp_k: f64,
}

impl EnrichedResult {
    #[must_use]
    pub fn new(city: impl Into<String>, temperatures: Temperatures) -> Self {
        Self {
            city: city.into(),
            temp_c: temperatures.celsius,
            temp_f: temperatures.fahrenheit,
            temp_k: temperatures.kelvin,
        }
    }
}
