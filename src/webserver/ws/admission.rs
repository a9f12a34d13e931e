/// Pre-upgrade admission policy
///
/// Pure functions over request headers and the security config, so the
/// policy is testable without a live connection. Nothing here touches the
/// hub: a refused request never creates client state.
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::SecurityConfig;
use crate::errors::AdmissionError;
use crate::webserver::utils;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter fallback for clients that cannot set headers (browsers)
pub const API_KEY_QUERY_PARAM: &str = "api_key";

// ============================================================================
// ORIGIN
// ============================================================================

/// Check the request origin against the allow-list
///
/// With auth disabled every origin is accepted. A missing Origin header is
/// a non-browser caller and is accepted.
pub fn check_origin(headers: &HeaderMap, allowed: &[String], auth_enabled: bool) -> bool {
    if !auth_enabled {
        return true;
    }

    match headers.get(header::ORIGIN) {
        None => true,
        Some(value) => match value.to_str() {
            Ok(origin) if origin.is_empty() => true,
            Ok(origin) => origin_allowed(origin, allowed),
            Err(_) => false,
        },
    }
}

/// Match one origin against the allow-list
///
/// Entries match exactly, or as `*.domain` which accepts any subdomain of
/// `domain` but not `domain` itself.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    let host = origin_host(origin);

    allowed.iter().any(|entry| {
        if entry == origin {
            return true;
        }
        match entry.strip_prefix("*.") {
            Some(domain) if !domain.is_empty() => host
                .strip_suffix(domain)
                .and_then(|rest| rest.strip_suffix('.'))
                .map_or(false, |subdomain| !subdomain.is_empty()),
            _ => false,
        }
    })
}

fn origin_host(origin: &str) -> String {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_ascii_lowercase()))
        .unwrap_or_else(|| origin.to_ascii_lowercase())
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Extract the API key query parameter from a raw query string
pub fn query_api_key(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Validate the API key (header first, then query parameter)
pub fn check_credentials(
    headers: &HeaderMap,
    query_key: Option<&str>,
    security: &SecurityConfig,
) -> Result<(), AdmissionError> {
    if !security.auth_enabled {
        return Ok(());
    }
    if security.api_key.is_empty() {
        return Err(AdmissionError::AuthNotConfigured);
    }

    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .or(query_key.filter(|value| !value.is_empty()));

    match presented {
        None => Err(AdmissionError::MissingCredentials),
        Some(key) if keys_match(key, &security.api_key) => Ok(()),
        Some(_) => Err(AdmissionError::InvalidCredentials),
    }
}

/// Constant-time comparison over fixed-length digests
fn keys_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Full admission check: credentials, then origin
pub fn admit(
    headers: &HeaderMap,
    query_key: Option<&str>,
    security: &SecurityConfig,
) -> Result<(), AdmissionError> {
    check_credentials(headers, query_key, security)?;

    if !check_origin(headers, &security.allowed_origins, security.auth_enabled) {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("<invalid>")
            .to_string();
        return Err(AdmissionError::OriginNotAllowed(origin));
    }

    Ok(())
}

impl AdmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::MissingCredentials | AdmissionError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AdmissionError::AuthNotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            AdmissionError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::MissingCredentials => "MISSING_API_KEY",
            AdmissionError::InvalidCredentials => "INVALID_API_KEY",
            AdmissionError::AuthNotConfigured => "AUTH_NOT_CONFIGURED",
            AdmissionError::OriginNotAllowed(_) => "ORIGIN_NOT_ALLOWED",
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        utils::error_response(self.status_code(), self.code(), &self.to_string(), None)
    }
}
