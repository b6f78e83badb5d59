//! Request header helpers shared by the admin handlers.

use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, USER_AGENT},
};
use std::net::IpAddr;

const UNKNOWN_CLIENT: &str = "unknown";
const MAX_USER_AGENT_LEN: usize = 512;

/// Extract a client IP from common proxy headers.
///
/// Values that do not parse as an IP address are ignored, so the result is
/// always safe to store as `inet`.
pub(super) fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok());

    [forwarded, real_ip]
        .into_iter()
        .flatten()
        .find_map(|value| value.trim().parse().ok())
}

/// Limiter key: the client IP, or a shared bucket when none is known.
pub(super) fn client_key(ip: Option<IpAddr>) -> String {
    ip.map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string())
}

/// Bearer token from the `Authorization` header, if well formed.
pub(super) fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub(super) fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.chars().take(MAX_USER_AGENT_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers), "203.0.113.9".parse().ok());
    }

    #[test]
    fn client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_client_ip(&headers), "10.0.0.2".parse().ok());
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn client_ip_ignores_values_that_are_not_addresses() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("foo, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(extract_client_ip(&headers), "2001:db8::1".parse().ok());

        headers.insert("x-real-ip", HeaderValue::from_static("unknown"));
        assert_eq!(extract_client_ip(&headers), None);
    }

    #[test]
    fn client_key_defaults_to_unknown() {
        assert_eq!(client_key(None), "unknown");
        assert_eq!(client_key("10.0.0.1".parse().ok()), "10.0.0.1");
    }

    #[test]
    fn bearer_accepts_both_casings() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn bearer_rejects_other_schemes_and_empty_tokens() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn user_agent_is_truncated() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(600);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&long).unwrap_or_else(|_| HeaderValue::from_static("a")),
        );
        assert_eq!(extract_user_agent(&headers).map(|ua| ua.len()), Some(512));
    }
}
