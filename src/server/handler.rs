// src/server/handler.rs
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use super::health_service::HealthService;
use crate::config::ServerConfig;
use crate::metrics::{MetricsCollector, Timer};

const ALLOWED_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";

/// Routes for the backend half: `/` and `{base}/health`.
#[derive(Clone)]
pub struct ApiHandler {
    inner: Arc<Inner>,
    metrics: Option<Arc<MetricsCollector>>,
}

struct Inner {
    project_name: String,
    version: String,
    health_path: String,
    cors_origins: Vec<String>,
    health: HealthService,
}

impl ApiHandler {
    pub fn new(config: &ServerConfig, base_path: &str, health: HealthService) -> Self {
        Self {
            inner: Arc::new(Inner {
                project_name: config.project_name.clone(),
                version: config.version.clone(),
                health_path: format!("{}/health", base_path.trim_end_matches('/')),
                cors_origins: config.cors_origins.clone(),
                health,
            }),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let timer = Timer::new();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let (route, mut response) = self.route(&method, &path, &headers).await;
        if let Some(origin) = headers.get(header::ORIGIN) {
            self.inner.apply_cors(origin, response.headers_mut());
        }

        tracing::debug!(
            %method,
            %path,
            status = response.status().as_u16(),
            "request served"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_api_request(route, response.status().as_u16(), timer.elapsed());
        }

        response
    }

    async fn route(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> (&'static str, Response<Body>) {
        let is_health = path == self.inner.health_path;

        if method == Method::OPTIONS {
            return ("preflight", self.inner.preflight(headers));
        }

        if path != "/" && !is_health {
            return (
                "not_found",
                json_response(StatusCode::NOT_FOUND, json!({"detail": "Not Found"})),
            );
        }

        if method != Method::GET {
            return (
                "method_not_allowed",
                json_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    json!({"detail": "Method Not Allowed"}),
                ),
            );
        }

        if is_health {
            ("health", self.health().await)
        } else {
            ("/", self.inner.root())
        }
    }

    async fn health(&self) -> Response<Body> {
        let status = self.inner.health.status().await;
        json_response(StatusCode::OK, json!(status))
    }
}

impl Inner {
    fn root(&self) -> Response<Body> {
        json_response(
            StatusCode::OK,
            json!({
                "message": format!("{} API", self.project_name),
                "version": self.version,
                "docs": "/docs",
            }),
        )
    }

    fn is_allowed_origin(&self, origin: &HeaderValue) -> bool {
        origin
            .to_str()
            .map(|origin| self.cors_origins.iter().any(|allowed| allowed == origin || allowed == "*"))
            .unwrap_or(false)
    }

    fn apply_cors(&self, origin: &HeaderValue, headers: &mut HeaderMap) {
        if !self.is_allowed_origin(origin) {
            return;
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    fn preflight(&self, request_headers: &HeaderMap) -> Response<Body> {
        let allowed = request_headers
            .get(header::ORIGIN)
            .map_or(false, |origin| self.is_allowed_origin(origin));

        if !allowed {
            let mut response = Response::new(Body::from("Disallowed CORS origin"));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return response;
        }

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;

        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        response
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

impl Service<Request<Body>> for ApiHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}
