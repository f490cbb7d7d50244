//! Wiring of configuration into the two routers

use axum::Router;
use std::sync::Arc;

use crate::api::{InboundPolicy, PipelineState, RelayState, pipeline_router, relay_router};
use crate::config::CepWeatherConfig;
use crate::context::TracePropagator;
use crate::http_client::TracedClient;
use crate::location_resolver::ViaCepResolver;
use crate::pipeline::AggregationPipeline;
use crate::relay::RequestRelay;
use crate::weather::WeatherApiFetcher;

/// Router for the client-facing relay
pub fn relay(config: &CepWeatherConfig, propagator: TracePropagator) -> crate::Result<Router> {
    let client = TracedClient::new(propagator.clone())?;
    let relay = RequestRelay::new(&config.relay, client);
    Ok(relay_router(RelayState {
        relay: Arc::new(relay),
        policy: InboundPolicy::new(config.relay.timeout(), propagator),
    }))
}

/// Router for the lookup pipeline. Fails without a weather API key.
pub fn pipeline(config: &CepWeatherConfig, propagator: TracePropagator) -> crate::Result<Router> {
    let api_key = config.require_weather_api_key()?;

    let client = TracedClient::new(propagator.clone())?;
    let resolver = ViaCepResolver::new(&config.directory, client.clone());
    let fetcher = WeatherApiFetcher::new(&config.weather, api_key, client);

    let pipeline = AggregationPipeline::new(Arc::new(resolver), Arc::new(fetcher));
    Ok(pipeline_router(PipelineState {
        pipeline: Arc::new(pipeline),
        policy: InboundPolicy::new(config.pipeline.timeout(), propagator),
    }))
}
