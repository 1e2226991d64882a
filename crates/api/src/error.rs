//! Error responses.
//!
//! Every failure leaves a handler as `{ "error", "message", "details" }`
//! with the status code the billing engine assigns to it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use freightbill_core::{EngineError, ErrorKind};
use freightbill_db::RepositoryError;
use freightbill_shared::AppError;
use serde_json::{Value, json};
use thiserror::Error;
use validator::ValidationErrors;

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A billing rule or storage failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Authentication, authorization or request shape problem.
    #[error(transparent)]
    App(#[from] AppError),

    /// The request body failed field validation.
    #[error("Request validation failed: {0}")]
    InvalidRequest(#[from] ValidationErrors),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self::Engine(err.into_engine())
    }
}

impl ApiError {
    /// Shorthand for a malformed request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::App(AppError::Validation(message.into()))
    }

    /// Shorthand for a request without verified claims.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::App(AppError::Unauthorized(message.into()))
    }

    /// Shorthand for a role check failure.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::App(AppError::Forbidden(message.into()))
    }

    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Engine(e) => e.http_status_code(),
            Self::App(e) => e.status_code(),
            Self::InvalidRequest(_) => 400,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// JSON body of the response.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Engine(e) if e.kind() == ErrorKind::Internal => json!({
                "error": e.error_code(),
                "message": "An internal error occurred",
                "details": {},
            }),
            Self::Engine(e) => json!({
                "error": e.error_code(),
                "message": e.to_string(),
                "details": e.details(),
                "retryable": e.is_retryable(),
            }),
            Self::App(e) => json!({
                "error": e.error_code(),
                "message": e.to_string(),
                "details": {},
            }),
            Self::InvalidRequest(e) => json!({
                "error": "VALIDATION_ERROR",
                "message": "Request validation failed",
                "details": e,
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightbill_core::lifecycle::{InvoiceStatus, LifecycleError};
    use freightbill_core::ownership::OwnershipError;
    use freightbill_shared::types::{InvoiceId, ParcelId};
    use http_body_util::BodyExt;
    use rstest::rstest;
    use sea_orm::DbErr;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_names_current_owner() {
        let parcel_id = ParcelId::new();
        let owner = InvoiceId::new();
        let err: ApiError = EngineError::from(OwnershipError::Conflict {
            parcel_id,
            current_owner: owner,
        })
        .into();

        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "PARCEL_ALREADY_CLAIMED");
        assert_eq!(
            body["details"]["conflicts"][0]["current_owner"],
            json!(owner)
        );
    }

    #[tokio::test]
    async fn test_locked_invoice_is_423_with_status() {
        let err: ApiError = EngineError::from(LifecycleError::InvoiceLocked {
            invoice_id: InvoiceId::new(),
            status: InvoiceStatus::Paid,
        })
        .into();

        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["error"], "INVOICE_LOCKED");
        assert_eq!(body["details"]["status"], "paid");
    }

    #[tokio::test]
    async fn test_database_error_hides_message() {
        let err: ApiError = RepositoryError::Database(DbErr::Custom("secret dsn".into())).into();

        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "DATABASE_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }

    #[rstest]
    #[case(ApiError::bad_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(ApiError::forbidden("nope"), StatusCode::FORBIDDEN)]
    #[case(
        ApiError::unauthorized("missing"),
        StatusCode::UNAUTHORIZED
    )]
    #[case(
        ApiError::Engine(EngineError::StorageUnavailable("pool".into())),
        StatusCode::SERVICE_UNAVAILABLE
    )]
    fn test_status_mapping(#[case] err: ApiError, #[case] expected: StatusCode) {
        assert_eq!(err.status(), expected);
    }

    #[test]
    fn test_retryable_flag_reported() {
        let err = ApiError::Engine(EngineError::ConcurrentModification {
            invoice_id: InvoiceId::new(),
            expected_version: 3,
        });
        let body = err.body();
        assert_eq!(body["error"], "CONCURRENT_MODIFICATION");
        assert_eq!(body["retryable"], true);
    }
}
