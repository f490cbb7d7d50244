use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

use super::{CepQuery, InboundPolicy, health, with_service_layers};
use crate::models::EnrichedResult;
use crate::relay::{RelayError, RequestRelay};

#[derive(Clone)]
pub struct RelayState {
    pub relay: Arc<RequestRelay>,
    pub policy: InboundPolicy,
}

/// Body of `POST /`
#[derive(Debug, Deserialize)]
struct CepRequest {
    cep: String,
}

pub fn router(state: RelayState) -> Router {
    let routes = Router::new()
        .route("/", get(lookup_by_query).post(lookup_by_body))
        .route("/health", get(health))
        .with_state(state);
    with_service_layers(routes)
}

async fn lookup_by_body(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EnrichedResult>, RelayError> {
    // Not JSON, no `cep`, or `cep` not a string: all the same client error
    let request: CepRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Unreadable request body");
        RelayError::InvalidShape
    })?;
    lookup(&state, &headers, &request.cep).await
}

async fn lookup_by_query(
    State(state): State<RelayState>,
    headers: HeaderMap,
    query: Result<Query<CepQuery>, QueryRejection>,
) -> Result<Json<EnrichedResult>, RelayError> {
    let cep = CepQuery::cep(query).ok_or(RelayError::InvalidShape)?;
    lookup(&state, &headers, &cep).await
}

async fn lookup(
    state: &RelayState,
    headers: &HeaderMap,
    identifier: &str,
) -> Result<Json<EnrichedResult>, RelayError> {
    let span = info_span!("relay.request", otel.kind = "server");
    let ctx = state.policy.context(headers, &span);
    let _cancel_guard = ctx.cancel_on_drop();

    state
        .relay
        .forward(identifier, &ctx)
        .instrument(span)
        .await
        .map(Json)
}
