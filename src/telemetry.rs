//! Log and trace output for both services
//!
//! Logs go to stderr through `tracing-subscriber`, pretty or JSON. When an
//! OTLP endpoint is configured, spans are also exported over HTTP/protobuf
//! through `tracing-opentelemetry`.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::CepWeatherError;
use crate::config::{LoggingConfig, TelemetryConfig};

/// Flushes and shuts down span export when dropped
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to flush trace export: {e}");
            }
        }
    }
}

/// Level directive for the filter. `RUST_LOG` wins over both.
fn filter_directive(logging: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        format!("{}=debug,tower_http=debug,info", env!("CARGO_CRATE_NAME"))
    } else {
        logging.level.clone()
    }
}

fn build_provider(endpoint: &str, service_name: &str) -> crate::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| CepWeatherError::telemetry(format!("OTLP exporter: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Install the global subscriber. Call once, before any service starts.
pub fn init(
    logging: &LoggingConfig,
    telemetry: &TelemetryConfig,
    service_name: &str,
    verbose: bool,
) -> crate::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(logging, verbose)))
        .map_err(|e| CepWeatherError::telemetry(format!("invalid log filter: {e}")))?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let provider = telemetry
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| build_provider(endpoint, service_name))
        .transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter)
        .try_init()
        .map_err(|e| CepWeatherError::telemetry(format!("subscriber already set: {e}")))?;

    Ok(TelemetryGuard { provider })
}
