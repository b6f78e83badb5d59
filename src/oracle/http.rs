//! HTTP transport for the oracle and for privileged data calls.
//!
//! Both helpers share one timeout policy and never log token material. Every
//! privileged call carries the session's bearer token so the server can
//! attribute the access in its audit log.

use super::{AuthorizationOracle, AuthorizationVerdict, OracleError, parse_verdict};
use crate::{APP_USER_AGENT, session::SessionStore};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::{future::Future, pin::Pin, time::Duration};
use tracing::{debug, error, instrument};

/// Default request timeout applied to oracle and admin calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;
const VERIFY_PATH: &str = "/v1/admin/verify";

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Sanitizes HTTP error bodies by trimming and truncating.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

/// Oracle reachable over HTTP at `POST {base}/v1/admin/verify`.
#[derive(Clone, Debug)]
pub struct HttpOracle {
    client: Client,
    verify_url: String,
}

impl HttpOracle {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            verify_url: build_url_with_base(base_url, VERIFY_PATH),
        })
    }

    #[must_use]
    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    #[instrument(skip_all, fields(url = %self.verify_url))]
    async fn request_verdict(
        &self,
        bearer_token: &SecretString,
    ) -> Result<AuthorizationVerdict, OracleError> {
        let response = self
            .client
            .post(&self.verify_url)
            .bearer_auth(bearer_token.expose_secret())
            .send()
            .await
            .map_err(|err| {
                error!("Admin verification request failed: {err}");
                OracleError::Unreachable(err.to_string())
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| {
            error!("Failed to read admin verification response: {err}");
            OracleError::Unreachable(err.to_string())
        })?;

        debug!("Admin verification returned {status}");

        // Error pages from proxies and gateways are transport failures, not verdicts.
        if !status.is_success() && serde_json::from_slice::<IgnoredAny>(&body).is_err() {
            error!("Admin verification failed with {status} and a non-JSON body");
            return Err(OracleError::Unreachable(format!(
                "{status}: {}",
                sanitize_body(&String::from_utf8_lossy(&body))
            )));
        }

        parse_verdict(status.is_success(), &body)
    }
}

impl AuthorizationOracle for HttpOracle {
    fn verify<'a>(
        &'a self,
        bearer_token: &'a SecretString,
    ) -> Pin<Box<dyn Future<Output = Result<AuthorizationVerdict, OracleError>> + Send + 'a>> {
        Box::pin(self.request_verdict(bearer_token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminApiError {
    #[error("Authentication required")]
    NoSession,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
}

/// Client for privileged data endpoints. Refuses to send without a session.
#[derive(Clone, Debug)]
pub struct AdminApi {
    client: Client,
    base_url: String,
}

impl AdminApi {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.to_string(),
        })
    }

    /// Fetches JSON from a privileged endpoint with the current bearer token.
    ///
    /// # Errors
    /// Returns `AdminApiError::NoSession` when no active session exists, and
    /// network, HTTP, or decode errors otherwise.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        sessions: &dyn SessionStore,
        path: &str,
    ) -> Result<T, AdminApiError> {
        let session = sessions.active().ok_or(AdminApiError::NoSession)?;
        let url = build_url_with_base(&self.base_url, path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(session.bearer_token.expose_secret())
            .send()
            .await
            .map_err(|err| AdminApiError::Network(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|err| AdminApiError::Parse(format!("Failed to decode response: {err}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AdminApiError::Http {
                status: status.as_u16(),
                message: sanitize_body(&body),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStore, Session};
    use anyhow::Result;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn token() -> SecretString {
        SecretString::from("bearer-123".to_string())
    }

    #[test]
    fn build_url_joins_slashes() {
        assert_eq!(
            build_url_with_base("https://api.example.com/", "/v1/admin/verify"),
            "https://api.example.com/v1/admin/verify"
        );
        assert_eq!(build_url_with_base("", "/v1/admin/verify"), "/v1/admin/verify");
    }

    #[test]
    fn sanitize_body_truncates() {
        assert_eq!(sanitize_body("   "), "Request failed.");
        assert_eq!(sanitize_body(&"x".repeat(500)).len(), MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn verify_sends_bearer_and_parses_grant() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/admin/verify"))
            .and(header("Authorization", "Bearer bearer-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorized": true,
                "userId": "u-1",
                "email": "admin@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri())?;
        let verdict = oracle.verify(&token()).await;
        assert_eq!(
            verdict,
            Ok(AuthorizationVerdict::granted(
                "u-1",
                Some("admin@example.com".to_string())
            ))
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_reads_refusal_from_forbidden() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/admin/verify"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "authorized": false,
                "error": "Admin privileges required"
            })))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri())?;
        let verdict = oracle.verify(&token()).await;
        assert_eq!(
            verdict,
            Ok(AuthorizationVerdict::refused("Admin privileges required"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_flags_malformed_payload() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/admin/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri())?;
        assert!(matches!(
            oracle.verify(&token()).await,
            Err(OracleError::Malformed(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verify_treats_gateway_error_page_as_unreachable() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/admin/verify"))
            .respond_with(
                ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"),
            )
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri())?;
        assert!(matches!(
            oracle.verify(&token()).await,
            Err(OracleError::Unreachable(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verify_rejects_grant_with_error_status() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/admin/verify"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "authorized": true })))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri())?;
        assert!(matches!(
            oracle.verify(&token()).await,
            Err(OracleError::Malformed(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn verify_reports_unreachable() -> Result<()> {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let oracle = HttpOracle::with_timeout("http://127.0.0.1:9", Duration::from_millis(500))?;
        assert!(matches!(
            oracle.verify(&token()).await,
            Err(OracleError::Unreachable(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn admin_api_requires_session() -> Result<()> {
        let api = AdminApi::new("http://127.0.0.1:9")?;
        let sessions = MemorySessionStore::new();
        let result = api
            .get_json::<serde_json::Value>(&sessions, "/v1/admin/audit")
            .await;
        assert_eq!(result, Err(AdminApiError::NoSession));
        Ok(())
    }

    #[tokio::test]
    async fn admin_api_forwards_bearer() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/admin/audit"))
            .and(header("Authorization", "Bearer bearer-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let api = AdminApi::new(&server.uri())?;
        let sessions = MemorySessionStore::with_session(Session::new("u-1", token()));
        let body: serde_json::Value = api
            .get_json(&sessions, "/v1/admin/audit")
            .await
            .map_err(|err| anyhow::anyhow!(err))?;
        assert_eq!(body, json!({ "records": [] }));
        Ok(())
    }

    #[tokio::test]
    async fn admin_api_honours_timeout() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/admin/audit"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "records": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let api = AdminApi::with_timeout(&server.uri(), Duration::from_millis(200))?;
        let sessions = MemorySessionStore::with_session(Session::new("u-1", token()));
        let result = api
            .get_json::<serde_json::Value>(&sessions, "/v1/admin/audit")
            .await;
        assert!(matches!(result, Err(AdminApiError::Network(_))));
        Ok(())
    }

    #[tokio::test]
    async fn admin_api_surfaces_http_errors() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/admin/audit"))
            .respond_with(ResponseTemplate::new(403).set_body_string("  forbidden  "))
            .mount(&server)
            .await;

        let api = AdminApi::new(&server.uri())?;
        let sessions = MemorySessionStore::with_session(Session::new("u-1", token()));
        let result = api
            .get_json::<serde_json::Value>(&sessions, "/v1/admin/audit")
            .await;
        assert_eq!(
            result,
            Err(AdminApiError::Http {
                status: 403,
                message: "forbidden".to_string()
            })
        );
        Ok(())
    }
}
