//! Admin oracle endpoints.
//!
//! Flow Overview:
//! 1) Reject clients in cooldown before touching the directory.
//! 2) Resolve the bearer token to a subject and check the `admin` role.
//! 3) Count every failed attempt against the client; a success clears them.
//! 4) Append one audit record per successful privileged access.
//!
//! Security boundaries:
//! - The actor in an audit record always comes from the resolved token.
//! - Directory and audit failures fail closed.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    types::{AuditLogResponse, AuditQuery},
    utils::{client_key, extract_bearer, extract_client_ip, extract_user_agent},
};
use crate::{
    api::{
        directory::{AdminDirectory, Subject},
        limiter::{AttemptLimiter, LimitError, LimiterConfig},
    },
    audit::{AuditEntry, AuditSink},
    oracle::AuthorizationVerdict,
    security::SecurityStatus,
};

pub const ACTION_VERIFY_ADMIN: &str = "verify_admin";
pub const RESOURCE_ADMIN_PANEL: &str = "admin_panel";
pub const ACTION_LIST_AUDIT: &str = "list_audit";
pub const RESOURCE_AUDIT_LOG: &str = "audit_log";

pub struct AdminState {
    limiter: AttemptLimiter,
    directory: Arc<dyn AdminDirectory>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminState")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl AdminState {
    #[must_use]
    pub fn new(directory: Arc<dyn AdminDirectory>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            limiter: AttemptLimiter::default(),
            directory,
            audit,
        }
    }

    #[must_use]
    pub fn with_limiter(mut self, config: LimiterConfig) -> Self {
        self.limiter = AttemptLimiter::new(config);
        self
    }

    #[must_use]
    pub fn limiter(&self) -> &AttemptLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn directory(&self) -> &dyn AdminDirectory {
        self.directory.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminRejection {
    Unauthenticated,
    Forbidden,
    RateLimited { retry_after: u64 },
    DirectoryUnavailable,
    AuditUnavailable,
}

impl AdminRejection {
    fn status(self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DirectoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::AuditUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Authentication required",
            Self::Forbidden => "Admin privileges required",
            Self::RateLimited { .. } => "Too many attempts, try again later",
            Self::DirectoryUnavailable => "Verification unavailable",
            Self::AuditUnavailable => "Audit log unavailable",
        }
    }
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            Json(AuthorizationVerdict::refused(self.message())),
        )
            .into_response();
        if let Self::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

/// Resolve the caller to an admin subject, counting failures against `client`.
async fn require_admin(
    headers: &HeaderMap,
    state: &AdminState,
    client: &str,
) -> Result<Subject, AdminRejection> {
    if let Err(LimitError::Cooldown { remaining_seconds }) = state.limiter().check(client) {
        warn!("Admin verification blocked for client {client}: {remaining_seconds}s cooldown");
        return Err(AdminRejection::RateLimited {
            retry_after: remaining_seconds,
        });
    }

    let Some(token) = extract_bearer(headers) else {
        state.limiter().record_failure(client);
        return Err(AdminRejection::Unauthenticated);
    };

    let subject = match state.directory().resolve(&token).await {
        Ok(Some(subject)) => subject,
        Ok(None) => {
            debug!("Unknown or expired session token");
            state.limiter().record_failure(client);
            return Err(AdminRejection::Unauthenticated);
        }
        Err(err) => {
            error!("Failed to resolve session token: {err:#}");
            return Err(AdminRejection::DirectoryUnavailable);
        }
    };

    if !subject.is_admin {
        info!(user_id = %subject.user_id, "Admin verification refused");
        state.limiter().record_failure(client);
        return Err(AdminRejection::Forbidden);
    }

    state.limiter().record_success(client);
    Ok(subject)
}

async fn audit(
    state: &AdminState,
    headers: &HeaderMap,
    subject: &Subject,
    action: &str,
    resource_type: &str,
) -> Result<(), AdminRejection> {
    let entry = AuditEntry::new(subject.user_id, action, resource_type)
        .with_client(
            extract_client_ip(headers).map(|ip| ip.to_string()),
            extract_user_agent(headers),
        );
    match state.audit().append(entry).await {
        Ok(record) => {
            debug!(audit_id = %record.id, action, "Audit record appended");
            Ok(())
        }
        Err(err) => {
            error!("Failed to append audit record: {err}");
            Err(AdminRejection::AuditUnavailable)
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/verify",
    responses(
        (status = 200, description = "Caller holds the admin role.", body = AuthorizationVerdict),
        (status = 401, description = "Missing, unknown or expired bearer token.", body = AuthorizationVerdict),
        (status = 403, description = "Caller is not an admin.", body = AuthorizationVerdict),
        (status = 429, description = "Too many failed attempts.", body = AuthorizationVerdict),
        (status = 503, description = "Session directory unavailable.", body = AuthorizationVerdict),
    ),
    tag = "admin"
)]
pub async fn verify(headers: HeaderMap, state: Extension<Arc<AdminState>>) -> Response {
    let client = client_key(extract_client_ip(&headers));

    let subject = match require_admin(&headers, &state, &client).await {
        Ok(subject) => subject,
        Err(rejection) => return rejection.into_response(),
    };

    if let Err(rejection) = audit(
        &state,
        &headers,
        &subject,
        ACTION_VERIFY_ADMIN,
        RESOURCE_ADMIN_PANEL,
    )
    .await
    {
        return rejection.into_response();
    }

    let verdict = AuthorizationVerdict::granted(subject.user_id.to_string(), Some(subject.email));
    (StatusCode::OK, Json(verdict)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/admin/security-status",
    responses(
        (status = 200, description = "Attempt counters for the calling client.", body = SecurityStatus),
    ),
    tag = "admin"
)]
pub async fn security_status(headers: HeaderMap, state: Extension<Arc<AdminState>>) -> Response {
    let client = client_key(extract_client_ip(&headers));
    let status = SecurityStatus::project(&state.limiter().snapshot(&client));
    (StatusCode::OK, Json(status)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Most recent audit records.", body = AuditLogResponse),
        (status = 401, description = "Missing, unknown or expired bearer token.", body = AuthorizationVerdict),
        (status = 403, description = "Caller is not an admin.", body = AuthorizationVerdict),
        (status = 429, description = "Too many failed attempts.", body = AuthorizationVerdict),
        (status = 500, description = "Audit log unavailable.", body = AuthorizationVerdict),
    ),
    tag = "admin"
)]
pub async fn audit_log(
    headers: HeaderMap,
    query: Query<AuditQuery>,
    state: Extension<Arc<AdminState>>,
) -> Response {
    let client = client_key(extract_client_ip(&headers));

    let subject = match require_admin(&headers, &state, &client).await {
        Ok(subject) => subject,
        Err(rejection) => return rejection.into_response(),
    };

    if let Err(rejection) = audit(
        &state,
        &headers,
        &subject,
        ACTION_LIST_AUDIT,
        RESOURCE_AUDIT_LOG,
    )
    .await
    {
        return rejection.into_response();
    }

    match state.audit().recent(query.effective_limit()).await {
        Ok(records) => (StatusCode::OK, Json(AuditLogResponse { records })).into_response(),
        Err(err) => {
            error!("Failed to list audit records: {err}");
            AdminRejection::AuditUnavailable.into_response()
        }
    }
}
