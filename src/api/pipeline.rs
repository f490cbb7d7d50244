use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::HeaderMap,
    routing::get,
};
use std::sync::Arc;
use tracing::{Instrument, info_span};

use super::{CepQuery, InboundPolicy, health, with_service_layers};
use crate::models::EnrichedResult;
use crate::pipeline::{AggregationPipeline, PipelineError};

#[derive(Clone)]
pub struct PipelineState {
    pub pipeline: Arc<AggregationPipeline>,
    pub policy: InboundPolicy,
}

pub fn router(state: PipelineState) -> Router {
    let routes = Router::new()
        .route("/", get(lookup))
        .route("/health", get(health))
        .with_state(state);
    with_service_layers(routes)
}

async fn lookup(
    State(state): State<PipelineState>,
    headers: HeaderMap,
    query: Result<Query<CepQuery>, QueryRejection>,
) -> Result<Json<EnrichedResult>, PipelineError> {
    let cep = CepQuery::cep(query).ok_or(PipelineError::InvalidShape)?;

    let span = info_span!("pipeline.request", otel.kind = "server");
    let ctx = state.policy.context(&headers, &span);
    let _cancel_guard = ctx.cancel_on_drop();

    state
        .pipeline
        .handle(&cep, &ctx)
        .instrument(span)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RequestContext, TracePropagator};
    use crate::location_resolver::LocalityResolver;
    use crate::models::{Cep, LocalityRecord, WeatherSnapshot};
    use crate::upstream::{FetchError, ResolveError};
    use crate::weather::WeatherFetcher;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Remembers the trace id and budget each lookup arrived with
    #[derive(Default)]
    struct RecordingResolver {
        seen: Mutex<Vec<(Option<String>, Duration)>>,
    }

    #[async_trait]
    impl LocalityResolver for RecordingResolver {
        async fn resolve(
            &self,
            cep: &Cep,
            ctx: &RequestContext,
        ) -> Result<LocalityRecord, ResolveError> {
            self.seen.lock().unwrap().push((ctx.trace_id(), ctx.remaining()));
            match cep.as_str() {
                "99999999" => Err(ResolveError::NotFound),
                _ => Ok(LocalityRecord::new("Porto Alegre").with_state("RS")),
            }
        }
    }

    struct FixedFetcher;

    #[async_trait]
    impl WeatherFetcher for FixedFetcher {
        async fn fetch(&self, _: &str, _: &RequestContext) -> Result<WeatherSnapshot, FetchError> {
            Ok(WeatherSnapshot::new(-2.0))
        }
    }

    fn app(resolver: Arc<RecordingResolver>) -> Router {
        router(PipelineState {
            pipeline: Arc::new(AggregationPipeline::new(resolver, Arc::new(FixedFetcher))),
            policy: InboundPolicy::new(Duration::from_secs(10), TracePropagator::w3c()),
        })
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_returns_all_units() {
        let response = app(Arc::default())
            .oneshot(Request::get("/?cep=90010000").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["city"], "Porto Alegre");
        assert_eq!(json["temp_C"], -2.0);
        assert_eq!(json["temp_F"], 28.4);
        assert_eq!(json["temp_K"], 271.0);
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = app(Arc::default())
            .oneshot(Request::get("/?cep=99999999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "can not find zipcode");
    }

    #[tokio::test]
    async fn test_missing_cep_is_unprocessable() {
        let resolver = Arc::new(RecordingResolver::default());
        let response = app(resolver.clone())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resolver.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_cep_is_unprocessable() {
        let resolver = Arc::new(RecordingResolver::default());
        let response = app(resolver.clone())
            .oneshot(Request::get("/?cep=abc&cep=def").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_text(response).await, "invalid zipcode");
        assert!(resolver.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_trace_and_budget_reach_resolver() {
        let resolver = Arc::new(RecordingResolver::default());
        let request = Request::get("/?cep=90010000")
            .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .header("x-request-timeout-ms", "1500")
            .body(Body::empty())
            .unwrap();

        let response = app(resolver.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = resolver.seen.lock().unwrap();
        let (trace_id, remaining) = &seen[0];
        assert_eq!(trace_id.as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert!(*remaining <= Duration::from_millis(1500));
    }
}
