//! Aggregation pipeline: postal code -> locality -> weather -> temperatures
//!
//! Stages run strictly in sequence (the weather lookup needs the locality)
//! and the first failure ends the request. Nothing is retried and no partial
//! result is ever returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::context::RequestContext;
use crate::location_resolver::LocalityResolver;
use crate::models::{Cep, EnrichedResult, InvalidShape, Temperatures};
use crate::upstream::{FetchError, ResolveError, UpstreamError};
use crate::weather::WeatherFetcher;

/// Client-facing body for 404 responses
pub const NOT_FOUND_MESSAGE: &str = "can not find zipcode";
/// Client-facing body for 422 responses
pub const INVALID_MESSAGE: &str = "invalid zipcode";
/// Client-facing body for 500 responses
pub const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid zipcode shape")]
    InvalidShape,

    #[error("zipcode not found")]
    NotFound,

    #[error("upstream rejected the zipcode")]
    InvalidInput,

    /// Transport or decode failure; the detail is for logs only
    #[error("internal failure: {0}")]
    Internal(String),
}

impl PipelineError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidShape => "invalid_shape",
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidShape | Self::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_resolve(err: ResolveError) -> Self {
        Self::from_stage("directory", err)
    }

    fn from_fetch(err: FetchError) -> Self {
        Self::from_stage("weather", err)
    }

    fn from_stage(stage: &str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound => Self::NotFound,
            UpstreamError::BadRequest => Self::InvalidInput,
            UpstreamError::Transport(detail) | UpstreamError::Decode(detail) => {
                Self::Internal(format!("{stage}: {detail}"))
            }
        }
    }
}

impl From<InvalidShape> for PipelineError {
    fn from(_: InvalidShape) -> Self {
        Self::InvalidShape
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal detail never leaves the process
        let message = match &self {
            Self::NotFound => NOT_FOUND_MESSAGE,
            Self::InvalidShape | Self::InvalidInput => INVALID_MESSAGE,
            Self::Internal(_) => INTERNAL_MESSAGE,
        };

        (status, message).into_response()
    }
}

/// Runs the lookup stages for one request. The collaborators are built once
/// at startup and shared by all requests.
#[derive(Clone)]
pub struct AggregationPipeline {
    resolver: Arc<dyn LocalityResolver>,
    fetcher: Arc<dyn WeatherFetcher>,
}

impl AggregationPipeline {
    #[must_use]
    pub fn new(resolver: Arc<dyn LocalityResolver>, fetcher: Arc<dyn WeatherFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    #[instrument(
        name = "pipeline.handle",
        skip(self, ctx),
        fields(trace_id = ctx.trace_id().as_deref())
    )]
    pub async fn handle(
        &self,
        identifier: &str,
        ctx: &RequestContext,
    ) -> Result<EnrichedResult, PipelineError> {
        let cep = Cep::parse(identifier)
            .inspect_err(|e| debug!(error = %e, "Rejected before lookup"))?;

        let locality = self
            .resolver
            .resolve(&cep, ctx)
            .await
            .map_err(PipelineError::from_resolve)
            .inspect_err(log_failure)?;

        let snapshot = self
            .fetcher
            .fetch(&locality.locality, ctx)
            .await
            .map_err(PipelineError::from_fetch)
            .inspect_err(log_failure)?;

        let temperatures = Temperatures::from_celsius(snapshot.temp_c);
        let result = EnrichedResult::new(locality.locality, temperatures);
        info!(city = %result.city, temp_c = result.temp_c, "Lookup complete");
        Ok(result)
    }
}

fn log_failure(err: &PipelineError) {
    match err {
        PipelineError::Internal(detail) => error!(error = %detail, "Lookup failed"),
        other => debug!(outcome = other.error_type(), "Lookup ended without a result"),
    }
}
