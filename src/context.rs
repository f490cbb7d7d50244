//! Per-request context threaded through every stage
//!
//! A [`RequestContext`] bundles the three things that must survive both hops
//! and both third-party calls: the deadline, a cancellation signal and the
//! OpenTelemetry context carrying the distributed trace identity.
//!
//! Trace identity crosses the wire as W3C `traceparent`/`tracestate` plus
//! `baggage`; the remaining deadline crosses as [`REQUEST_TIMEOUT_HEADER`].

use http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::propagation::{
    Extractor, Injector, TextMapCompositePropagator, TextMapPropagator,
};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Remaining request budget in milliseconds, set by the relay on the
/// forwarded call and honoured by the pipeline.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Why a bounded operation did not run to completion
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("request cancelled")]
    Cancelled,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancel: CancellationToken,
    trace: opentelemetry::Context,
}

impl RequestContext {
    /// Context with a fresh cancellation token and no trace parent
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
            trace: opentelemetry::Context::new(),
        }
    }

    /// Build the context for an inbound request: trace parent from headers,
    /// deadline from the smaller of `max_timeout` and the caller's budget.
    #[must_use]
    pub fn from_inbound(
        headers: &HeaderMap,
        max_timeout: Duration,
        propagator: &TracePropagator,
    ) -> Self {
        let timeout = inbound_timeout(headers)
            .map_or(max_timeout, |budget| budget.min(max_timeout));
        Self::new(timeout).with_trace(propagator.extract(headers))
    }

    #[must_use]
    pub fn with_trace(mut self, trace: opentelemetry::Context) -> Self {
        self.trace = trace;
        self
    }

    /// Re-parent the trace context onto `span` when a tracing-opentelemetry
    /// layer is installed; otherwise keep the inbound parent so the trace id
    /// still flows downstream.
    #[must_use]
    pub fn entered(mut self, span: &tracing::Span) -> Self {
        let _ = span.set_parent(self.trace.clone());
        let span_cx = span.context();
        if span_cx.span().span_context().is_valid() {
            self.trace = span_cx;
        }
        self
    }

    /// Cancels this context when dropped. Handlers hold it so that a client
    /// disconnect, which drops the handler future, cancels in-flight calls.
    #[must_use]
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Time left before the deadline, zero once it has passed
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn trace(&self) -> &opentelemetry::Context {
        &self.trace
    }

    /// Hex trace id, if the context carries a valid span context
    #[must_use]
    pub fn trace_id(&self) -> Option<String> {
        let span = self.trace.span();
        let span_context = span.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    }

    /// Drive `fut` until it completes, the context is cancelled or the
    /// deadline passes. On interruption `fut` is dropped, which aborts any
    /// request it owns.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("remaining", &self.remaining())
            .field("cancelled", &self.is_cancelled())
            .field("trace_id", &self.trace_id())
            .finish()
    }
}

fn inbound_timeout(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Header value announcing the remaining budget of `ctx`
#[must_use]
pub fn timeout_header_value(ctx: &RequestContext) -> HeaderValue {
    HeaderValue::from(u64::try_from(ctx.remaining().as_millis()).unwrap_or(u64::MAX))
}

/// Text-map propagator used on every hop. Constructed once at startup and
/// handed to the components that need it instead of living in a global.
#[derive(Clone)]
pub struct TracePropagator {
    inner: Arc<TextMapCompositePropagator>,
}

impl TracePropagator {
    /// W3C trace context plus W3C baggage
    #[must_use]
    pub fn w3c() -> Self {
        let propagator = TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]);
        Self {
            inner: Arc::new(propagator),
        }
    }

    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> opentelemetry::Context {
        self.inner.extract(&HeaderExtractor(headers))
    }

    pub fn inject(&self, cx: &opentelemetry::Context, headers: &mut HeaderMap) {
        self.inner.inject_context(cx, &mut HeaderInjector(headers));
    }
}

impl Default for TracePropagator {
    fn default() -> Self {
        Self::w3c()
    }
}

impl fmt::Debug for TracePropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracePropagator")
            .field("fields", &self.inner.fields().collect::<Vec<_>>())
            .finish()
    }
}

/// Extractor for trace context from HTTP headers.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Injector for trace context into outbound HTTP headers.
struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        // Invalid names/values are dropped rather than failing the request
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}
