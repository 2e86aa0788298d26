//! Errors returned by the relay endpoint.
//!
//! Callers only ever see a status code and a generic plain-text body. The
//! underlying cause is logged here and never written to the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crawlgate_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The origin answered with a non-2xx status.
    #[error("UPSTREAM_STATUS: origin returned {0}")]
    UpstreamStatus(StatusCode),

    /// The origin could not be reached or its body could not be read.
    #[error("RELAY_FAILED: {0}")]
    Failed(#[from] Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::UpstreamStatus(status) => (status, "Upstream request failed").into_response(),
            RelayError::Failed(err) => {
                tracing::error!(error = %err, "relay failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_is_passed_through() {
        let response = RelayError::UpstreamStatus(StatusCode::NOT_FOUND).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_failure_is_internal_error() {
        let response = RelayError::Failed(Error::HttpError("connection refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
