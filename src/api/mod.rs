//! Admin oracle HTTP service.

use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, options},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod directory;
pub mod handlers;
pub mod limiter;
mod openapi;

pub use handlers::AdminState;
pub use openapi::openapi;

use crate::audit::PgAuditSink;
use directory::PgAdminDirectory;
use limiter::LimiterConfig;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

#[derive(Clone, Debug, Default)]
pub struct ApiConfig {
    frontend_base_url: Option<String>,
    limiter: LimiterConfig,
}

impl ApiConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_frontend_base_url(mut self, url: Option<String>) -> Self {
        self.frontend_base_url = url;
        self
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> Option<&str> {
        self.frontend_base_url.as_deref()
    }

    #[must_use]
    pub fn limiter(&self) -> LimiterConfig {
        self.limiter
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: ApiConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let state = AdminState::new(
        Arc::new(PgAdminDirectory::new(pool.clone())),
        Arc::new(PgAuditSink::new(pool)),
    )
    .with_limiter(config.limiter());

    let frontend_origin = config
        .frontend_base_url()
        .map(frontend_origin)
        .transpose()?;
    if frontend_origin.is_none() {
        warn!("No frontend base URL configured, cross-origin requests will be refused");
    }

    let app = app(Arc::new(state), frontend_origin);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Assemble the full service: documented routes, `/openapi.json` and layers.
pub fn app(state: Arc<AdminState>, frontend_origin: Option<HeaderValue>) -> Router {
    let mut cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST]);
    if let Some(origin) = frontend_origin {
        cors = cors.allow_origin(AllowOrigin::exact(origin));
    }

    let (router, _openapi) = router().split_for_parts();
    router
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/health", options(handlers::health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::directory::{AdminDirectory, Subject},
        audit::MemoryAuditSink,
    };
    use axum::{body::to_bytes, http::StatusCode};
    use std::{future::Future, pin::Pin};
    use tower::ServiceExt;

    struct EmptyDirectory;

    impl AdminDirectory for EmptyDirectory {
        fn resolve<'a>(
            &'a self,
            _token: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Subject>>> + Send + 'a>> {
            Box::pin(async { Ok(None) })
        }

        fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            Box::pin(async { true })
        }
    }

    fn test_app() -> Router {
        let state = AdminState::new(Arc::new(EmptyDirectory), Arc::new(MemoryAuditSink::new()));
        app(Arc::new(state), None)
    }

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://studio.example.com:8443/admin")?;
        assert_eq!(origin, "https://studio.example.com:8443");
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[test]
    fn api_config_defaults() {
        let config = ApiConfig::new();
        assert_eq!(config.frontend_base_url(), None);
        assert_eq!(config.limiter(), LimiterConfig::default());
    }

    #[tokio::test]
    async fn app_serves_openapi_document() -> Result<()> {
        let response = test_app()
            .oneshot(Request::builder().uri("/openapi.json").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let doc: serde_json::Value = serde_json::from_slice(&body)?;
        assert!(doc["paths"]["/v1/admin/verify"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn app_assigns_request_id() -> Result<()> {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-request-id", "req-1")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(
            response
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok()),
            Some("req-1")
        );
        Ok(())
    }
}
