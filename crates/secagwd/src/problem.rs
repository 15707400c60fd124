//! problem+json responses

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use secagw_core::{GatewayError, Problem};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// A handler failure bound to the request path it occurred on
#[derive(Debug)]
pub struct ApiError {
    error: GatewayError,
    path: String,
}

impl ApiError {
    pub fn new(error: GatewayError, uri: &Uri) -> Self {
        Self {
            error,
            path: uri.path().to_string(),
        }
    }

    pub fn error(&self) -> &GatewayError {
        &self.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = Problem::from_error(&self.error, &self.path);
        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(path = %self.path, "{}", self.error);
        } else {
            tracing::debug!(path = %self.path, "{}", self.error);
        }

        let mut response = (status, Json(problem)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        response
    }
}

/// Attach the request path to a core result
pub trait AtPath<T> {
    fn at(self, uri: &Uri) -> Result<T, ApiError>;
}

impl<T> AtPath<T> for secagw_core::Result<T> {
    fn at(self, uri: &Uri) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(e, uri))
    }
}

/// Malformed JSON bodies become `invalid-request` problems
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>, uri: &Uri) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::new(GatewayError::invalid(rejection.body_text()), uri))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secagw_cloud::ProviderErrorKind;

    fn content_type(response: &Response) -> &str {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_status_and_content_type() {
        let uri: Uri = "/v1/tenants/t1/workspaces/ws1".parse().unwrap();
        let response = ApiError::new(GatewayError::not_found("workspace ws1"), &uri).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(content_type(&response), PROBLEM_CONTENT_TYPE);
    }

    #[test]
    fn test_provider_kind_maps_status() {
        let uri: Uri = "/v1/regions".parse().unwrap();
        let err = GatewayError::Provider {
            kind: ProviderErrorKind::RateLimited,
            code: "rate_limit_exceeded".to_string(),
            message: "slow down".to_string(),
        };
        let response = ApiError::new(err, &uri).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_path_excludes_query() {
        let uri: Uri = "/v1/skus?page=2".parse().unwrap();
        let err = ApiError::new(GatewayError::Internal("boom".to_string()), &uri);
        assert_eq!(err.path, "/v1/skus");
        assert!(matches!(err.error(), GatewayError::Internal(_)));
    }
}
