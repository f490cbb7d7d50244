//! Validating relay in front of the aggregation pipeline
//!
//! The relay rejects malformed postal codes itself and forwards everything
//! else to the pipeline service, carrying the trace context and the remaining
//! deadline on the inter-service call.

use axum::http::StatusCode;
use http::{HeaderMap, HeaderName};
use tracing::{debug, error, instrument, warn};

use crate::config::RelayConfig;
use crate::context::{REQUEST_TIMEOUT_HEADER, RequestContext, timeout_header_value};
use crate::http_client::TracedClient;
use crate::models::{Cep, EnrichedResult};
use crate::pipeline::PipelineError;

/// The relay reports the same client-visible outcomes as the pipeline, so a
/// pipeline reply translates 1:1.
pub type RelayError = PipelineError;

pub struct RequestRelay {
    client: TracedClient,
    pipeline_url: String,
}

impl RequestRelay {
    #[must_use]
    pub fn new(config: &RelayConfig, client: TracedClient) -> Self {
        Self {
            client,
            pipeline_url: config.pipeline_url.trim_end_matches('/').to_string(),
        }
    }

    fn forward_url(&self, cep: &Cep) -> String {
        format!("{}/?cep={}", self.pipeline_url, cep)
    }

    /// Validate `identifier` and ask the pipeline for its weather
    #[instrument(
        name = "relay.forward",
        skip(self, ctx),
        fields(trace_id = ctx.trace_id().as_deref())
    )]
    pub async fn forward(
        &self,
        identifier: &str,
        ctx: &RequestContext,
    ) -> Result<EnrichedResult, RelayError> {
        let cep =
            Cep::parse(identifier).inspect_err(|e| debug!(error = %e, "Rejected locally"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(REQUEST_TIMEOUT_HEADER),
            timeout_header_value(ctx),
        );

        let reply = self
            .client
            .get_with_headers(&self.forward_url(&cep), headers, ctx)
            .await
            .map_err(|e| {
                error!(error = %e, "Pipeline call failed");
                RelayError::Internal(format!("pipeline: {e}"))
            })?;

        match reply.status {
            StatusCode::OK => serde_json::from_slice(&reply.body).map_err(|e| {
                error!(error = %e, body = %reply.body_excerpt(), "Malformed pipeline response");
                RelayError::Internal(format!("pipeline decode: {e}"))
            }),
            StatusCode::NOT_FOUND => Err(RelayError::NotFound),
            StatusCode::UNPROCESSABLE_ENTITY => Err(RelayError::InvalidInput),
            other => {
                warn!(status = other.as_u16(), "Pipeline returned an unexpected status");
                Err(RelayError::Internal(format!("pipeline status {other}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TracePropagator;
    use rstest::rstest;
    use std::time::Duration;

    fn relay(url: &str) -> RequestRelay {
        let config = RelayConfig {
            pipeline_url: url.to_string(),
            timeout_seconds: 10,
        };
        RequestRelay::new(&config, TracedClient::new(TracePropagator::w3c()).unwrap())
    }

    #[test]
    fn test_forward_url() {
        let cep = Cep::parse("01310100").unwrap();
        assert_eq!(
            relay("http://pipeline:8081/").forward_url(&cep),
            "http://pipeline:8081/?cep=01310100"
        );
    }

    #[rstest]
    #[case("abc")]
    #[case("123456789")]
    #[tokio::test]
    async fn test_invalid_shape_is_not_forwarded(#[case] identifier: &str) {
        // Nothing listens on port 9; a forwarded call would surface as Internal
        let relay = relay("http://127.0.0.1:9");
        let ctx = RequestContext::new(Duration::from_secs(1));
        assert_eq!(
            relay.forward(identifier, &ctx).await,
            Err(RelayError::InvalidShape)
        );
    }

    #[tokio::test]
    async fn test_unreachable_pipeline_is_internal() {
        let relay = relay("http://127.0.0.1:9");
        let ctx = RequestContext::new(Duration::from_secs(2));
        let err = relay.forward("01310100", &ctx).await.unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
