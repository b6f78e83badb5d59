use super::AdminState;
use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Session directory is reachable", body = Health),
        (status = 503, description = "Session directory is unreachable", body = Health)
    ),
    tag = "health"
)]
// axum handler for health
pub async fn health(method: Method, state: Extension<Arc<AdminState>>) -> impl IntoResponse {
    let is_healthy = state.directory().ping().await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if is_healthy { "ok" } else { "error" }.to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = health.commit.get(0..7).unwrap_or("");

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            error!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    if is_healthy {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::directory::{AdminDirectory, Subject},
        audit::MemoryAuditSink,
    };
    use anyhow::Result;
    use axum::{
        Router,
        body::to_bytes,
        http::Request,
        routing::get,
    };
    use std::{future::Future, pin::Pin};
    use tower::ServiceExt;

    struct Reachable(bool);

    impl AdminDirectory for Reachable {
        fn resolve<'a>(
            &'a self,
            _token: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Subject>>> + Send + 'a>> {
            Box::pin(async { Ok(None) })
        }

        fn ping(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            let reachable = self.0;
            Box::pin(async move { reachable })
        }
    }

    fn app(reachable: bool) -> Router {
        let state = AdminState::new(
            Arc::new(Reachable(reachable)),
            Arc::new(MemoryAuditSink::new()),
        );
        Router::new()
            .route("/health", get(health).head(health))
            .layer(Extension(Arc::new(state)))
    }

    #[tokio::test]
    async fn health_reports_ok() -> Result<()> {
        let response = app(true)
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let x_app = response
            .headers()
            .get("X-App")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(x_app.starts_with(env!("CARGO_PKG_NAME")));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.database, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_unavailable_database() -> Result<()> {
        let response = app(false)
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.database, "error");
        Ok(())
    }

    #[tokio::test]
    async fn head_returns_empty_body() -> Result<()> {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("HEAD")
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
