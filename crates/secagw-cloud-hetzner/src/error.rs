//! Hetzner Cloud error classification
//!
//! The API reports failures as `{"error": {"code": "...", "message": "..."}}`.
//! Codes are mapped through [`HETZNER_ERROR_CODES`]; unknown codes fall back
//! to the HTTP status.

use secagw_cloud::{CloudError, ErrorCodeTable, ProviderErrorKind, classify};
use serde::Deserialize;

/// Vendor code -> gateway classification
pub const HETZNER_ERROR_CODES: ErrorCodeTable = &[
    ("invalid_input", ProviderErrorKind::InvalidRequest),
    ("json_error", ProviderErrorKind::InvalidRequest),
    ("invalid_server_type", ProviderErrorKind::InvalidRequest),
    ("not_found", ProviderErrorKind::NotFound),
    ("conflict", ProviderErrorKind::Conflict),
    ("uniqueness_error", ProviderErrorKind::Conflict),
    ("locked", ProviderErrorKind::Conflict),
    ("protected", ProviderErrorKind::Conflict),
    ("resource_limit_exceeded", ProviderErrorKind::Conflict),
    ("server_not_stopped", ProviderErrorKind::Conflict),
    ("server_already_stopped", ProviderErrorKind::Conflict),
    ("server_already_added", ProviderErrorKind::Conflict),
    ("server_already_attached", ProviderErrorKind::Conflict),
    ("rate_limit_exceeded", ProviderErrorKind::RateLimited),
    ("resource_unavailable", ProviderErrorKind::Unavailable),
    ("placement_error", ProviderErrorKind::Unavailable),
    ("no_space_left_in_location", ProviderErrorKind::Unavailable),
    ("server_error", ProviderErrorKind::Unavailable),
    ("service_error", ProviderErrorKind::Unavailable),
    ("maintenance", ProviderErrorKind::Unavailable),
    ("timeout", ProviderErrorKind::Unavailable),
    ("unavailable", ProviderErrorKind::Unavailable),
    ("unauthorized", ProviderErrorKind::Unauthorized),
    ("forbidden", ProviderErrorKind::Unauthorized),
    ("token_readonly", ProviderErrorKind::Unauthorized),
    ("unsupported_error", ProviderErrorKind::Unsupported),
    ("deprecated_api_endpoint", ProviderErrorKind::Unsupported),
];

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Build a classified [`CloudError`] from a non-2xx response
pub fn api_error(http_status: u16, body: &str) -> CloudError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let kind = classify(HETZNER_ERROR_CODES, &envelope.error.code, http_status);
            CloudError::provider(kind, envelope.error.code, envelope.error.message)
        }
        Err(_) => {
            let kind = ProviderErrorKind::from_http_status(http_status);
            let message = if body.trim().is_empty() {
                format!("HTTP {}", http_status)
            } else {
                body.trim().to_string()
            };
            CloudError::provider(kind, format!("http_{}", http_status), message)
        }
    }
}
