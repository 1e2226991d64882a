//! Authentication middleware for protected routes.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use freightbill_core::lifecycle::UserRole;
use freightbill_shared::types::{TenantId, UserId};
use freightbill_shared::{Claims, JwtError};
use serde_json::json;

use crate::{AppState, error::ApiError};

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Authentication middleware that validates JWT tokens.
///
/// Valid claims are stored in the request extensions, where [`AuthUser`]
/// picks them up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "MISSING_TOKEN",
                "message": "Authorization header with Bearer token is required"
            })),
        )
            .into_response();
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            let (error, message) = match e {
                JwtError::Expired => ("TOKEN_EXPIRED", "Token has expired"),
                _ => ("INVALID_TOKEN", "Invalid or malformed token"),
            };
            tracing::debug!(error = %e, "Rejected bearer token");

            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": error, "message": message })),
            )
                .into_response()
        }
    }
}

/// Extractor for authenticated user claims.
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> Result<Json<Value>, ApiError> {
///     auth.require(UserRole::EDIT)?;
///     let tenant = auth.tenant_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        UserId::from_uuid(self.0.user_id())
    }

    /// Returns the tenant the caller acts for.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.0.tenant_id())
    }

    /// The caller's role, if the token carries a known one.
    #[must_use]
    pub fn role(&self) -> Option<UserRole> {
        UserRole::parse(&self.0.role)
    }

    /// Checks the caller holds at least `required` and returns the role.
    ///
    /// # Errors
    ///
    /// Returns a forbidden error for a lower or unknown role.
    pub fn require(&self, required: UserRole) -> Result<UserRole, ApiError> {
        match self.role() {
            Some(role) if role.satisfies(required) => Ok(role),
            Some(role) => Err(ApiError::forbidden(format!(
                "Role {} cannot perform this action, {} required",
                role.as_str(),
                required.as_str()
            ))),
            None => Err(ApiError::forbidden(format!(
                "Unknown role: {}",
                self.0.role
            ))),
        }
    }

    /// Returns the inner claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
