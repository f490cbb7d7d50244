//! Shared utilities for integration tests: in-process mock upstreams and a
//! running relay + pipeline pair wired to them.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use cep_weather::{CepWeatherConfig, TracePropagator, service, web};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const API_KEY: &str = "test-key";
pub const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
pub const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

/// Postal codes the mock directory knows how to answer
pub mod ceps {
    /// São Paulo, 25.0 °C
    pub const SAO_PAULO: &str = "01310100";
    /// ViaCEP `erro` sentinel
    pub const UNKNOWN: &str = "99999999";
    /// Directory answers 400
    pub const REJECTED: &str = "40000000";
    /// Directory answers 500
    pub const BROKEN: &str = "50000000";
    /// Directory answers 200 with HTML
    pub const GARBLED: &str = "20000000";
    /// Directory never answers in time
    pub const HANGING: &str = "77777777";
    /// Locality the weather provider does not know (code 1006)
    pub const NO_WEATHER: &str = "88888888";
    /// Locality the weather provider rejects with another code
    pub const WEATHER_ERROR: &str = "66666666";
}

/// What the mock upstreams saw
#[derive(Default)]
pub struct UpstreamLog {
    pub directory_calls: AtomicUsize,
    pub weather_calls: AtomicUsize,
    pub traceparents: Mutex<Vec<String>>,
    pub weather_queries: Mutex<Vec<String>>,
    /// Hanging directory lookups that started
    pub hanging_started: AtomicUsize,
    /// Set once a hanging directory lookup was abandoned by its caller
    pub hanging_dropped: AtomicBool,
}

/// Flags the log when the handler future holding it is dropped unfinished
struct AbandonGuard(Arc<UpstreamLog>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        self.0.hanging_dropped.store(true, Ordering::SeqCst);
    }
}

impl UpstreamLog {
    pub fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }

    pub fn weather_calls(&self) -> usize {
        self.weather_calls.load(Ordering::SeqCst)
    }

    pub fn hanging_started(&self) -> usize {
        self.hanging_started.load(Ordering::SeqCst)
    }

    pub fn hanging_dropped(&self) -> bool {
        self.hanging_dropped.load(Ordering::SeqCst)
    }

    pub fn trace_ids(&self) -> Vec<String> {
        self.traceparents
            .lock()
            .unwrap()
            .iter()
            .filter_map(|tp| tp.split('-').nth(1).map(str::to_string))
            .collect()
    }

    fn record_trace(&self, headers: &HeaderMap) {
        if let Some(tp) = headers.get("traceparent").and_then(|v| v.to_str().ok()) {
            self.traceparents.lock().unwrap().push(tp.to_string());
        }
    }
}

async fn directory(
    State(log): State<Arc<UpstreamLog>>,
    headers: HeaderMap,
    Path(cep): Path<String>,
) -> Response {
    log.directory_calls.fetch_add(1, Ordering::SeqCst);
    log.record_trace(&headers);

    let address = |city: &str| {
        Json(json!({
            "cep": cep,
            "logradouro": "Rua Teste",
            "bairro": "Centro",
            "localidade": city,
            "uf": "SP",
            "ibge": "3550308"
        }))
        .into_response()
    };

    match cep.as_str() {
        ceps::SAO_PAULO => address("São Paulo"),
        ceps::NO_WEATHER => address("Lugar Nenhum"),
        ceps::WEATHER_ERROR => address("Erro Interno"),
        ceps::UNKNOWN => Json(json!({"erro": "true"})).into_response(),
        ceps::REJECTED => (StatusCode::BAD_REQUEST, "<h1>Bad Request</h1>").into_response(),
        ceps::BROKEN => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        ceps::GARBLED => "<html>maintenance</html>".into_response(),
        ceps::HANGING => {
            log.hanging_started.fetch_add(1, Ordering::SeqCst);
            let guard = AbandonGuard(log.clone());
            tokio::time::sleep(Duration::from_secs(30)).await;
            std::mem::forget(guard);
            address("Tarde Demais")
        }
        _ => Json(json!({"erro": true})).into_response(),
    }
}

async fn weather(
    State(log): State<Arc<UpstreamLog>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    log.weather_calls.fetch_add(1, Ordering::SeqCst);
    log.record_trace(&headers);

    if params.get("key").map(String::as_str) != Some(API_KEY) {
        let body = json!({"error": {"code": 2006, "message": "API key is invalid."}});
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    let q = params.get("q").cloned().unwrap_or_default();
    log.weather_queries.lock().unwrap().push(q.clone());

    match q.as_str() {
        "São Paulo" => Json(json!({
            "location": {"name": "Sao Paulo", "region": "Sao Paulo", "country": "Brazil"},
            "current": {"temp_c": 25.0, "humidity": 61, "wind_kph": 11.2,
                        "condition": {"text": "Partly cloudy"}}
        }))
        .into_response(),
        "Lugar Nenhum" => Json(json!({
            "error": {"code": 1006, "message": "No matching location found."}
        }))
        .into_response(),
        _ => Json(json!({
            "error": {"code": 9999, "message": "Internal application error."}
        }))
        .into_response(),
    }
}

/// Spawn `app` on an ephemeral port and return its base URL
pub async fn spawn(app: Router, shutdown: &CancellationToken) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve_on(listener, app, shutdown.clone()));
    format!("http://{addr}")
}

/// Mock ViaCEP and WeatherAPI behind one router
pub fn upstream_router(log: Arc<UpstreamLog>) -> Router {
    Router::new()
        .route("/ws/{cep}/json/", get(directory))
        .route("/v1/current.json", get(weather))
        .with_state(log)
}

/// Relay, pipeline and mock upstreams, all running
pub struct Stack {
    pub relay_url: String,
    pub pipeline_url: String,
    pub log: Arc<UpstreamLog>,
    shutdown: CancellationToken,
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub struct StackOptions {
    pub api_key: &'static str,
    pub relay_timeout_seconds: u32,
    pub pipeline_timeout_seconds: u32,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            api_key: API_KEY,
            relay_timeout_seconds: 10,
            pipeline_timeout_seconds: 10,
        }
    }
}

pub async fn spawn_stack() -> Stack {
    spawn_stack_with(StackOptions::default()).await
}

pub async fn spawn_stack_with(options: StackOptions) -> Stack {
    let shutdown = CancellationToken::new();
    let log = Arc::new(UpstreamLog::default());
    let upstream_url = spawn(upstream_router(log.clone()), &shutdown).await;

    let mut config = CepWeatherConfig::default();
    config.directory.base_url = upstream_url.clone();
    config.weather.base_url = upstream_url;
    config.weather.api_key = Some(options.api_key.to_string());
    config.pipeline.timeout_seconds = options.pipeline_timeout_seconds;
    config.relay.timeout_seconds = options.relay_timeout_seconds;

    let pipeline = service::pipeline(&config, TracePropagator::w3c()).unwrap();
    let pipeline_url = spawn(pipeline, &shutdown).await;

    config.relay.pipeline_url = pipeline_url.clone();
    let relay = service::relay(&config, TracePropagator::w3c()).unwrap();
    let relay_url = spawn(relay, &shutdown).await;

    Stack {
        relay_url,
        pipeline_url,
        log,
        shutdown,
    }
}

/// Headers the recording pipeline stub received
#[derive(Default)]
pub struct ForwardLog {
    pub requests: Mutex<Vec<HeaderMap>>,
}

/// Stand-in for the pipeline that records forwarded headers and answers
/// with a fixed result
pub async fn spawn_recording_pipeline(shutdown: &CancellationToken) -> (String, Arc<ForwardLog>) {
    let log = Arc::new(ForwardLog::default());
    let app = Router::new()
        .route(
            "/",
            get(|State(log): State<Arc<ForwardLog>>, headers: HeaderMap| async move {
                log.requests.lock().unwrap().push(headers);
                Json(json!({"city": "Curitiba", "temp_C": 10.0, "temp_F": 50.0, "temp_K": 283.0}))
            }),
        )
        .with_state(log.clone());
    (spawn(app, shutdown).await, log)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap()
}
