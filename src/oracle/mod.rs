//! Remote authorization oracle: the authoritative admin check.
//!
//! Flow Overview:
//! 1) Send the session's bearer token to the oracle, no request body.
//! 2) Validate the response shape before trusting `authorized`.
//! 3) Map transport failures and invalid payloads to distinct errors so the
//!    guard can pick the right notice. Both fail closed.

mod http;

pub use http::{AdminApi, AdminApiError, HttpOracle};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{future::Future, pin::Pin};
use utoipa::ToSchema;

/// Oracle decision for one bearer token. Never cached across mounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationVerdict {
    pub authorized: bool,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl AuthorizationVerdict {
    #[must_use]
    pub fn granted(subject_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            authorized: true,
            subject_id: Some(subject_id.into()),
            email,
            error_reason: None,
        }
    }

    #[must_use]
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            subject_id: None,
            email: None,
            error_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Unreachable(String),
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

pub trait AuthorizationOracle: Send + Sync {
    fn verify<'a>(
        &'a self,
        bearer_token: &'a SecretString,
    ) -> Pin<Box<dyn Future<Output = Result<AuthorizationVerdict, OracleError>> + Send + 'a>>;
}

/// Validate an oracle payload.
///
/// `authorized` must be a boolean and the optional fields must be strings when
/// present. A non-success status can never carry a grant.
///
/// # Errors
/// Returns `OracleError::Malformed` when the payload does not match the expected shape.
pub fn parse_verdict(success_status: bool, body: &[u8]) -> Result<AuthorizationVerdict, OracleError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| OracleError::Malformed(format!("invalid JSON: {err}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| OracleError::Malformed("expected a JSON object".to_string()))?;

    let authorized = object
        .get("authorized")
        .and_then(Value::as_bool)
        .ok_or_else(|| OracleError::Malformed("`authorized` must be a boolean".to_string()))?;

    let verdict = AuthorizationVerdict {
        authorized,
        subject_id: optional_string(object.get("userId"), "userId")?,
        email: optional_string(object.get("email"), "email")?,
        error_reason: optional_string(object.get("error"), "error")?,
    };

    if verdict.authorized && !success_status {
        return Err(OracleError::Malformed(
            "grant returned with an error status".to_string(),
        ));
    }

    Ok(verdict)
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, OracleError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(OracleError::Malformed(format!("`{field}` must be a string"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_grant() {
        let body = br#"{"authorized":true,"userId":"u-1","email":"admin@example.com"}"#;
        let verdict = parse_verdict(true, body);
        assert_eq!(
            verdict,
            Ok(AuthorizationVerdict::granted(
                "u-1",
                Some("admin@example.com".to_string())
            ))
        );
    }

    #[test]
    fn parse_refusal_with_error_status() {
        let body = br#"{"authorized":false,"error":"Admin privileges required"}"#;
        let verdict = parse_verdict(false, body);
        assert_eq!(
            verdict,
            Ok(AuthorizationVerdict::refused("Admin privileges required"))
        );
    }

    #[test]
    fn parse_rejects_non_boolean_authorized() {
        for body in [
            br#"{"authorized":"true"}"#.as_slice(),
            br#"{"authorized":1}"#.as_slice(),
            br#"{"userId":"u-1"}"#.as_slice(),
            br#"[true]"#.as_slice(),
            b"not json".as_slice(),
        ] {
            assert!(matches!(
                parse_verdict(true, body),
                Err(OracleError::Malformed(_))
            ));
        }
    }

    #[test]
    fn parse_rejects_wrong_optional_types() {
        let body = br#"{"authorized":true,"userId":42}"#;
        assert!(matches!(
            parse_verdict(true, body),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_grant_with_error_status() {
        let body = br#"{"authorized":true,"userId":"u-1"}"#;
        assert!(matches!(
            parse_verdict(false, body),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn parse_accepts_null_optionals() {
        let body = br#"{"authorized":false,"userId":null,"email":null,"error":null}"#;
        assert_eq!(
            parse_verdict(true, body),
            Ok(AuthorizationVerdict::default())
        );
    }

    #[test]
    fn verdict_serializes_wire_names() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(AuthorizationVerdict::granted("u-1", None))?;
        assert_eq!(json, serde_json::json!({"authorized": true, "userId": "u-1"}));
        Ok(())
    }
}
