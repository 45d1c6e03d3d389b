use prometheus::{TextEncoder, Encoder, Registry, IntCounter, IntCounterVec, HistogramVec, HistogramOpts, opts};
use once_cell::sync::Lazy;
use axum::{response::{IntoResponse, Response}, http::{Request, StatusCode, HeaderValue}, middleware::Next, body::Body};
use uuid::Uuid;
use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("http_requests_total", "HTTP request count"), &["method", "path", "status"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"), &["method", "path"]).unwrap();
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});
pub static POLL_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("artifact_poll_attempts_total", "Existence checks issued while polling"), &["kind"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static POLL_TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("artifact_poll_timeouts_total", "Polls that hit their deadline"), &["kind"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(opts!("availability_cache_lookups_total", "Cache lookups by cache and outcome"), &["cache", "outcome"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});
pub static UPLOAD_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("upload_bytes_total", "Total uploaded CSV bytes").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&metric_families, &mut buf).is_err() { return StatusCode::INTERNAL_SERVER_ERROR.into_response(); }
    ([("Content-Type","text/plain; version=0.0.4")], buf).into_response()
}

/// Count and time every request, and tag the response with an `x-request-id`.
pub async fn track_metrics(mut req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path_label = normalize_path(req.uri().path());
    let req_id = Uuid::new_v4();
    req.extensions_mut().insert(req_id);
    let start = std::time::Instant::now();
    let mut resp = next.run(req).await;
    let status = resp.status().as_u16().to_string();
    HTTP_REQUESTS.with_label_values(&[method.as_str(), path_label.as_str(), status.as_str()]).inc();
    HTTP_REQUEST_DURATION.with_label_values(&[method.as_str(), path_label.as_str()]).observe(start.elapsed().as_secs_f64());
    if let Ok(v) = HeaderValue::from_str(&req_id.to_string()) { resp.headers_mut().insert("x-request-id", v); }
    resp
}

/// Collapse per-file path segments so metric label cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    for prefix in ["/download-summary/", "/download/", "/visualization/"] {
        if path.starts_with(prefix) && path.len() > prefix.len() { return format!("{prefix}:key"); }
    }
    path.to_string()
}

pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => tracing_subscriber::registry().with(env).with(base.json()).try_init()?,
        LogFormat::Compact => tracing_subscriber::registry().with(env).with(base.compact()).try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_keys() {
        assert_eq!(normalize_path("/download/cleaned_a.csv"), "/download/:key");
        assert_eq!(normalize_path("/download-summary/abc.csv"), "/download-summary/:key");
        assert_eq!(normalize_path("/visualization/x.png"), "/visualization/:key");
        assert_eq!(normalize_path("/results"), "/results");
    }
}
