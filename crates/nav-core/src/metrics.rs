use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

pub const CACHE_RESULT_HIT: &str = "hit";
pub const CACHE_RESULT_MISS: &str = "miss";

struct Metrics {
    registry: Registry,
    nav_up: IntGaugeVec,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    catalog_cache_lookups_total: IntCounterVec,
    catalog_refresh_total: IntCounterVec,
    catalog_links_dropped_total: IntCounterVec,
    notion_errors_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let nav_up = IntGaugeVec::new(Opts::new("nav_up", "Service health"), &["service"])
            .expect("nav_up metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP request count"),
            &["service", "route", "method", "status"],
        )
        .expect("http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["service", "route", "method", "status"],
        )
        .expect("http_request_duration_seconds metric");

        let catalog_cache_lookups_total = IntCounterVec::new(
            Opts::new(
                "catalog_cache_lookups_total",
                "Catalog snapshot lookups by cache result",
            ),
            &["result"],
        )
        .expect("catalog_cache_lookups_total metric");

        let catalog_refresh_total = IntCounterVec::new(
            Opts::new(
                "catalog_refresh_total",
                "Catalog snapshot rebuilds by snapshot origin",
            ),
            &["origin"],
        )
        .expect("catalog_refresh_total metric");

        let catalog_links_dropped_total = IntCounterVec::new(
            Opts::new(
                "catalog_links_dropped_total",
                "Upstream records dropped during validation",
            ),
            &["reason"],
        )
        .expect("catalog_links_dropped_total metric");

        let notion_errors_total = IntCounterVec::new(
            Opts::new("notion_errors_total", "Notion API failures by kind"),
            &["kind"],
        )
        .expect("notion_errors_total metric");

        registry
            .register(Box::new(nav_up.clone()))
            .expect("register nav_up");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("register http_request_duration_seconds");
        registry
            .register(Box::new(catalog_cache_lookups_total.clone()))
            .expect("register catalog_cache_lookups_total");
        registry
            .register(Box::new(catalog_refresh_total.clone()))
            .expect("register catalog_refresh_total");
        registry
            .register(Box::new(catalog_links_dropped_total.clone()))
            .expect("register catalog_links_dropped_total");
        registry
            .register(Box::new(notion_errors_total.clone()))
            .expect("register notion_errors_total");

        Metrics {
            registry,
            nav_up,
            http_requests_total,
            http_request_duration_seconds,
            catalog_cache_lookups_total,
            catalog_refresh_total,
            catalog_links_dropped_total,
            notion_errors_total,
        }
    })
}

pub fn init(service_name: &'static str) {
    metrics().nav_up.with_label_values(&[service_name]).set(1);
}

pub fn record_http_request(
    service_name: &'static str,
    method: &str,
    route: &str,
    status: u16,
    duration: Duration,
) {
    let status = status.to_string();
    let labels = [service_name, route, method, status.as_str()];
    let metrics = metrics();
    metrics.http_requests_total.with_label_values(&labels).inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(&labels)
        .observe(duration.as_secs_f64());
}

pub fn inc_cache_lookup(result: &'static str) {
    metrics()
        .catalog_cache_lookups_total
        .with_label_values(&[result])
        .inc();
}

pub fn inc_catalog_refresh(origin: &str) {
    metrics()
        .catalog_refresh_total
        .with_label_values(&[origin])
        .inc();
}

pub fn inc_links_dropped(reason: &str) {
    metrics()
        .catalog_links_dropped_total
        .with_label_values(&[reason])
        .inc();
}

pub fn inc_notion_error(kind: &str) {
    metrics()
        .notion_errors_total
        .with_label_values(&[kind])
        .inc();
}

pub fn metrics_response(service_name: &'static str) -> impl IntoResponse {
    init(service_name);
    let metric_families = metrics().registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            "failed to encode metrics".to_string(),
        );
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    (
        StatusCode::OK,
        headers,
        String::from_utf8_lossy(&buffer).to_string(),
    )
}

#[derive(Clone)]
pub struct MetricsLayer {
    service_name: &'static str,
}

impl MetricsLayer {
    pub fn new(service_name: &'static str) -> Self {
        Self { service_name }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    service_name: &'static str,
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            service_name: self.service_name,
        }
    }
}

impl<S, ReqBody, ResBody> Service<axum::http::Request<ReqBody>> for MetricsService<S>
where
    S: Service<axum::http::Request<ReqBody>, Response = axum::response::Response<ResBody>>
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = axum::response::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: axum::http::Request<ReqBody>) -> Self::Future {
        let service_name = self.service_name;
        let method = request.method().to_string();
        let route = route_label(request.uri().path());
        let start = Instant::now();
        let fut = self.inner.call(request);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    record_http_request(
                        service_name,
                        &method,
                        &route,
                        response.status().as_u16(),
                        start.elapsed(),
                    );
                    Ok(response)
                }
                Err(err) => {
                    record_http_request(service_name, &method, &route, 500, start.elapsed());
                    Err(err)
                }
            }
        })
    }
}

/// Collapses per-record path segments so link and page ids do not explode label cardinality.
fn route_label(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut label = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let parent = index.checked_sub(1).and_then(|prev| segments.get(prev));
        match parent {
            Some(&"links") | Some(&"pages") | Some(&"categories") if !segment.is_empty() => {
                label.push(":id")
            }
            _ => label.push(*segment),
        }
    }
    label.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn metrics_response_sets_content_type() {
        let response = metrics_response("nav-test").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, "text/plain; version=0.0.4");
    }

    #[test]
    fn route_label_collapses_record_ids() {
        assert_eq!(route_label("/v1/links/abc-123"), "/v1/links/:id");
        assert_eq!(route_label("/v1/pages/abc"), "/v1/pages/:id");
        assert_eq!(
            route_label("/v1/categories/tools/links"),
            "/v1/categories/:id/links"
        );
        assert_eq!(route_label("/v1/links"), "/v1/links");
        assert_eq!(route_label("/healthz"), "/healthz");
    }
}
