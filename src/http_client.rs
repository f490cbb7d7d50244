//! Traced outbound HTTP client
//!
//! Every outbound call in both services goes through [`TracedClient`]: a
//! `reqwest-middleware` client whose middleware writes the request's trace
//! context into the outgoing headers, and whose calls are raced against the
//! [`RequestContext`] deadline and cancellation. The body is read inside the
//! same bounded section so an interrupted call never leaves a response open.

use async_trait::async_trait;
use http::{Extensions, HeaderMap};
use reqwest::{Client, Request, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::CepWeatherError;
use crate::context::{Interrupted, RequestContext, TracePropagator};

/// Transport-level failure of an outbound call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Status and fully-read body of an upstream response
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawReply {
    /// Body as text for log lines, truncated
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

/// Injects the trace context found in the request extensions
struct PropagateTraceContext {
    propagator: TracePropagator,
}

#[async_trait]
impl Middleware for PropagateTraceContext {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        if let Some(cx) = extensions.get::<opentelemetry::Context>() {
            self.propagator.inject(cx, req.headers_mut());
        }
        next.run(req, extensions).await
    }
}

#[derive(Clone)]
pub struct TracedClient {
    inner: ClientWithMiddleware,
}

impl std::fmt::Debug for TracedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedClient").finish_non_exhaustive()
    }
}

impl TracedClient {
    /// Create a client with the crate user agent and no client-wide timeout;
    /// the per-request deadline comes from the [`RequestContext`].
    pub fn new(propagator: TracePropagator) -> Result<Self, CepWeatherError> {
        let client = Client::builder()
            .user_agent(concat!("cep-weather/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CepWeatherError::client(e.to_string()))?;
        Ok(Self::from_client(client, propagator))
    }

    #[must_use]
    pub fn from_client(client: Client, propagator: TracePropagator) -> Self {
        let inner = ClientBuilder::new(client)
            .with(PropagateTraceContext { propagator })
            .build();
        Self { inner }
    }

    pub async fn get(&self, url: &str, ctx: &RequestContext) -> Result<RawReply, TransportError> {
        self.get_with_headers(url, HeaderMap::new(), ctx).await
    }

    /// GET `url` with extra `headers`, bounded by `ctx`. The URL is redacted
    /// before it is recorded on the span.
    #[instrument(name = "http.client.request", skip_all, fields(url = %redact(url)))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
        ctx: &RequestContext,
    ) -> Result<RawReply, TransportError> {
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            return Err(Interrupted::DeadlineExceeded.into());
        }

        let request = self
            .inner
            .get(url)
            .headers(headers)
            .timeout(remaining)
            .with_extension(ctx.trace().clone());

        let started = Instant::now();
        let reply = ctx
            .run(async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                let status = response.status();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| TransportError::Body(e.to_string()))?
                    .to_vec();
                Ok::<_, TransportError>(RawReply { status, body })
            })
            .await
            .map_err(|interrupted| {
                warn!(error = %interrupted, "Outbound call interrupted");
                TransportError::from(interrupted)
            })??;

        debug!(
            status = reply.status.as_u16(),
            bytes = reply.body.len(),
            "Upstream replied in {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(reply)
    }
}

/// Strip credentials from a URL before it is logged
#[must_use]
pub fn redact(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name.eq_ignore_ascii_case("key") => format!("{name}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}
