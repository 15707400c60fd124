//! Provider error types
//!
//! Vendor errors are classified exactly once, at the adapter boundary, into
//! [`ProviderErrorKind`]. Each adapter supplies its own code table; the
//! lookup and the HTTP-status fallback live here so that classification is
//! total for every adapter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vendor-neutral classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderErrorKind {
    InvalidRequest,
    NotFound,
    /// Includes "resource locked"
    Conflict,
    RateLimited,
    Unavailable,
    /// Includes "forbidden"
    Unauthorized,
    Unsupported,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::InvalidRequest => "invalid-request",
            ProviderErrorKind::NotFound => "not-found",
            ProviderErrorKind::Conflict => "conflict",
            ProviderErrorKind::RateLimited => "rate-limited",
            ProviderErrorKind::Unavailable => "unavailable",
            ProviderErrorKind::Unauthorized => "unauthorized",
            ProviderErrorKind::Unsupported => "unsupported",
        }
    }

    /// Fallback classification for vendor codes missing from the table
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => ProviderErrorKind::InvalidRequest,
            401 | 403 => ProviderErrorKind::Unauthorized,
            404 => ProviderErrorKind::NotFound,
            409 | 423 => ProviderErrorKind::Conflict,
            429 => ProviderErrorKind::RateLimited,
            501 => ProviderErrorKind::Unsupported,
            s if (400..500).contains(&s) => ProviderErrorKind::InvalidRequest,
            _ => ProviderErrorKind::Unavailable,
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping table from vendor error code to [`ProviderErrorKind`]
pub type ErrorCodeTable = &'static [(&'static str, ProviderErrorKind)];

/// Classify a vendor error code, falling back to the HTTP status
pub fn classify(table: ErrorCodeTable, code: &str, http_status: u16) -> ProviderErrorKind {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, kind)| *kind)
        .unwrap_or_else(|| ProviderErrorKind::from_http_status(http_status))
}

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// No credential was supplied and no default client is configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Vendor error, already classified
    #[error("Provider error [{kind}/{code}]: {message}")]
    Provider {
        kind: ProviderErrorKind,
        code: String,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn provider(
        kind: ProviderErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CloudError::Provider {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classification of this error; transport failures count as `Unavailable`
    pub fn kind(&self) -> Option<ProviderErrorKind> {
        match self {
            CloudError::Provider { kind, .. } => Some(*kind),
            CloudError::Transport(_) => Some(ProviderErrorKind::Unavailable),
            _ => None,
        }
    }

    /// Raw vendor code, if the provider returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            CloudError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ProviderErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
