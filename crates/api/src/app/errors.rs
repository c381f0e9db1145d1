//! Consistent JSON error responses: `{"error": code, "message": msg}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use templeerp_auth::AuthzError;
use templeerp_core::DomainError;
use templeerp_infra::{DispatchError, WorkflowError};

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, "validation_error", message),
            DispatchError::InvariantViolation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
            }
            DispatchError::Concurrency(_) | DispatchError::Conflict(_) => {
                Self::new(StatusCode::CONFLICT, "conflict", message)
            }
            DispatchError::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            // Another tenant's stream is reported exactly like a missing one.
            DispatchError::TenantIsolation(_) => Self::new(StatusCode::NOT_FOUND, "not_found", "not found"),
            DispatchError::Deserialize(_) | DispatchError::Store(_) | DispatchError::Publish(_) => {
                tracing::error!(error = %err, "dispatch failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
            }
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::Dispatch(inner) => inner.into(),
            WorkflowError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, "validation_error", message),
            WorkflowError::InvariantViolation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
            }
            WorkflowError::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", message),
            WorkflowError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            WorkflowError::Incomplete { .. } => {
                tracing::error!(error = %err, "workflow left partially applied");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "workflow_incomplete", message)
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        DispatchError::from(err).into()
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_failures_map_to_http_statuses() {
        let cases = [
            (WorkflowError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (WorkflowError::InvariantViolation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (WorkflowError::Conflict("x".into()), StatusCode::CONFLICT),
            (WorkflowError::NotFound("ledger"), StatusCode::NOT_FOUND),
            (
                WorkflowError::Dispatch(DispatchError::Concurrency("stale".into())),
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::Incomplete {
                    step: "release reservation",
                    source: DispatchError::Publish("bus down".into()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn forbidden_and_domain_errors() {
        assert_eq!(
            ApiError::from(AuthzError::Forbidden("temple.*".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(DomainError::InvalidId("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
