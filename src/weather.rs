//! Weather provider client for WeatherAPI
//!
//! Fetches current conditions for a locality name and classifies the reply
//! the same way the directory client does, including WeatherAPI's in-body
//! `error` object.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::config::WeatherConfig;
use crate::context::RequestContext;
use crate::http_client::TracedClient;
use crate::models::WeatherSnapshot;
use crate::upstream::{FetchError, classify_status, decode_json};

/// Fetches current weather for a locality
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self, locality: &str, ctx: &RequestContext)
    -> Result<WeatherSnapshot, FetchError>;
}

pub struct WeatherApiFetcher {
    client: TracedClient,
    base_url: String,
    api_key: String,
}

impl WeatherApiFetcher {
    #[must_use]
    pub fn new(config: &WeatherConfig, api_key: impl Into<String>, client: TracedClient) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn current_url(&self, locality: &str) -> String {
        format!(
            "{}/v1/current.json?key={}&q={}&aqi=no",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(locality)
        )
    }
}

#[async_trait]
impl WeatherFetcher for WeatherApiFetcher {
    #[instrument(name = "weather.fetch", skip(self, ctx))]
    async fn fetch(
        &self,
        locality: &str,
        ctx: &RequestContext,
    ) -> Result<WeatherSnapshot, FetchError> {
        debug!("Fetching current weather");

        let reply = self.client.get(&self.current_url(locality), ctx).await?;
        classify_status(&reply).inspect_err(|e| {
            warn!(
                status = reply.status.as_u16(),
                outcome = e.error_type(),
                "Weather provider rejected lookup"
            );
        })?;

        let body: weatherapi::CurrentBody = decode_json(&reply).inspect_err(|e| {
            warn!(error = %e, body = %reply.body_excerpt(), "Malformed weather response");
        })?;

        match body.into_reply()? {
            weatherapi::WeatherReply::Current(snapshot) => {
                debug!("Current temperature {}", snapshot.format_temperature());
                Ok(snapshot)
            }
            weatherapi::WeatherReply::Rejected { code, message } => {
                warn!(code, message = %message, "Weather provider returned an error object");
                Err(weatherapi::classify_rejection(code))
            }
        }
    }
}

/// WeatherAPI response structures and conversion utilities
mod weatherapi {
    use serde::Deserialize;

    use crate::models::WeatherSnapshot;
    use crate::upstream::UpstreamError;

    /// "No matching location found."
    pub const NO_MATCHING_LOCATION: u32 = 1006;

    /// A decoded 200 reply, before it is classified
    #[derive(Debug, PartialEq)]
    pub enum WeatherReply {
        Current(WeatherSnapshot),
        /// The `error` sentinel object
        Rejected { code: u32, message: String },
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentBody {
        pub location: Option<LocationBody>,
        pub current: Option<CurrentData>,
        pub error: Option<ErrorBody>,
    }

    #[derive(Debug, Deserialize)]
    pub struct LocationBody {
        pub name: Option<String>,
        pub region: Option<String>,
        pub country: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CurrentData {
        pub temp_c: f64,
        pub humidity: Option<u8>,
        pub wind_kph: Option<f64>,
        pub condition: Option<Condition>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Condition {
        pub text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub code: u32,
        #[serde(default)]
        pub message: String,
    }

    impl CurrentBody {
        pub fn into_reply(self) -> Result<WeatherReply, UpstreamError> {
            if let Some(error) = self.error {
                return Ok(WeatherReply::Rejected {
                    code: error.code,
                    message: error.message,
                });
            }
            let current = self
                .current
                .ok_or_else(|| UpstreamError::Decode("response has no current block".into()))?;
            let location = self.location;
            Ok(WeatherReply::Current(WeatherSnapshot {
                temp_c: current.temp_c,
                humidity: current.humidity,
                wind_kph: current.wind_kph,
                condition: current.condition.and_then(|c| c.text),
                location_name: location.as_ref().and_then(|l| l.name.clone()),
                region: location.as_ref().and_then(|l| l.region.clone()),
                country: location.and_then(|l| l.country),
            }))
        }
    }

    pub fn classify_rejection(code: u32) -> UpstreamError {
        if code == NO_MATCHING_LOCATION {
            UpstreamError::NotFound
        } else {
            UpstreamError::BadRequest
        }
    }

}
