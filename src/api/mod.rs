//! HTTP surface of the two services
//!
//! Both routers build a [`RequestContext`] from the inbound headers, attach it
//! to a server span and hold a drop guard on it, so a client that disconnects
//! cancels the outbound calls made on its behalf.

pub mod pipeline;
pub mod relay;

use axum::Router;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::http::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::context::{RequestContext, TracePropagator};

pub use pipeline::{PipelineState, router as pipeline_router};
pub use relay::{RelayState, router as relay_router};

/// Inbound bodies are a single short JSON object
const MAX_BODY_BYTES: usize = 4 * 1024;

/// `?cep=` on either service
#[derive(Debug, Deserialize)]
pub struct CepQuery {
    pub cep: Option<String>,
}

impl CepQuery {
    /// The `cep` value, or `None` when the query string is unreadable or lacks one
    pub fn cep(query: Result<Query<Self>, QueryRejection>) -> Option<String> {
        match query {
            Ok(Query(query)) => query.cep,
            Err(rejection) => {
                debug!(error = %rejection, "Unreadable query string");
                None
            }
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

/// Deadline cap and trace extraction applied to every inbound request
#[derive(Clone, Debug)]
pub struct InboundPolicy {
    pub max_timeout: Duration,
    pub propagator: TracePropagator,
}

impl InboundPolicy {
    #[must_use]
    pub fn new(max_timeout: Duration, propagator: TracePropagator) -> Self {
        Self {
            max_timeout,
            propagator,
        }
    }

    #[must_use]
    pub fn context(&self, headers: &HeaderMap, span: &tracing::Span) -> RequestContext {
        RequestContext::from_inbound(headers, self.max_timeout, &self.propagator).entered(span)
    }
}

fn with_service_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    )
}
