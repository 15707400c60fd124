//! Gateway error taxonomy and problem descriptions
//!
//! Every failure the core surfaces resolves to a [`GatewayError`]; the HTTP
//! layer renders it as a [`Problem`]. Callers branch on
//! [`GatewayError::problem_type`], never on the message.

use crate::vault::VaultError;
use secagw_cloud::{CloudError, ProviderErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base of every problem type identifier
pub const PROBLEM_TYPE_BASE: &str = "http://secapi.cloud/errors/";

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Provider client or credential unavailable
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Workspace not active, no credentials, or a concurrent write won
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Vendor error, classification preserved from the adapter boundary
    #[error("Provider error [{kind}/{code}]: {message}")]
    Provider {
        kind: ProviderErrorKind,
        code: String,
        message: String,
    },

    /// Store or infrastructure failure
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        GatewayError::NotFound(format!("{} not found", what))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        GatewayError::Conflict(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidRequest(message.into())
    }

    /// Stable problem type identifier
    pub fn problem_type(&self) -> String {
        let suffix = match self {
            GatewayError::NotConfigured(_) => "provider-not-configured",
            GatewayError::InvalidRequest(_) => "invalid-request",
            GatewayError::NotFound(_) => "resource-not-found",
            GatewayError::Conflict(_) => "resource-conflict",
            GatewayError::Provider { kind, .. } => {
                return format!("{}provider-{}", PROBLEM_TYPE_BASE, kind.as_str());
            }
            GatewayError::Internal(_) => "internal-server-error",
        };
        format!("{}{}", PROBLEM_TYPE_BASE, suffix)
    }

    pub fn title(&self) -> &'static str {
        match self {
            GatewayError::NotConfigured(_) => "Provider Not Configured",
            GatewayError::InvalidRequest(_) => "Invalid Request",
            GatewayError::NotFound(_) => "Resource Not Found",
            GatewayError::Conflict(_) => "Resource Conflict",
            GatewayError::Provider { kind, .. } => match kind {
                ProviderErrorKind::InvalidRequest => "Provider Rejected Request",
                ProviderErrorKind::NotFound => "Provider Resource Not Found",
                ProviderErrorKind::Conflict => "Provider Resource Conflict",
                ProviderErrorKind::RateLimited => "Provider Rate Limited",
                ProviderErrorKind::Unavailable => "Provider Unavailable",
                ProviderErrorKind::Unauthorized => "Provider Unauthorized",
                ProviderErrorKind::Unsupported => "Provider Operation Unsupported",
            },
            GatewayError::Internal(_) => "Internal Server Error",
        }
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::NotConfigured(_) => 503,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::Conflict(_) => 409,
            GatewayError::Provider { kind, .. } => match kind {
                ProviderErrorKind::InvalidRequest => 422,
                ProviderErrorKind::NotFound => 404,
                ProviderErrorKind::Conflict => 409,
                ProviderErrorKind::RateLimited => 429,
                ProviderErrorKind::Unavailable => 503,
                ProviderErrorKind::Unauthorized => 403,
                ProviderErrorKind::Unsupported => 501,
            },
            GatewayError::Internal(_) => 500,
        }
    }

    fn detail(&self) -> String {
        match self {
            GatewayError::NotConfigured(m)
            | GatewayError::InvalidRequest(m)
            | GatewayError::NotFound(m)
            | GatewayError::Conflict(m)
            | GatewayError::Internal(m) => m.clone(),
            GatewayError::Provider { code, message, .. } => format!("{} ({})", message, code),
        }
    }
}

impl From<CloudError> for GatewayError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NotConfigured(m) => GatewayError::NotConfigured(m),
            CloudError::Provider {
                kind,
                code,
                message,
            } => GatewayError::Provider {
                kind,
                code,
                message,
            },
            CloudError::Transport(m) => GatewayError::Provider {
                kind: ProviderErrorKind::Unavailable,
                code: "transport".to_string(),
                message: m,
            },
            CloudError::InvalidResponse(m) => GatewayError::Provider {
                kind: ProviderErrorKind::Unavailable,
                code: "invalid_response".to_string(),
                message: m,
            },
            CloudError::Json(e) => GatewayError::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return GatewayError::Conflict(db.message().to_string());
            }
        }
        GatewayError::Internal(format!("store: {}", err))
    }
}

impl From<VaultError> for GatewayError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::EmptySecret => GatewayError::InvalidRequest(err.to_string()),
            _ => GatewayError::Internal(format!("credential vault: {}", err)),
        }
    }
}

/// Structured problem description (RFC 9457 shape)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Request path that failed
    pub instance: String,
}

impl Problem {
    pub fn from_error(err: &GatewayError, path: &str) -> Self {
        Self {
            problem_type: err.problem_type(),
            title: err.title().to_string(),
            status: err.status(),
            detail: err.detail(),
            instance: path.to_string(),
        }
    }
}
