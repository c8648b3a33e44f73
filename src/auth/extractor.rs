//! Axum extractor turning a bearer token into an [`AuthUser`].

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::JwtManager;
use crate::app_state::AppState;
use crate::domain::{Role, UserId};
use crate::error::ApiError;

/// The authenticated caller.
///
/// Use `AuthUser` for endpoints that require a token and
/// `Option<AuthUser>` for public endpoints that show more to staff.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Token subject.
    pub id: UserId,
    /// Email claim.
    pub email: String,
    /// Name claim.
    pub name: String,
    /// Role claim.
    pub role: Role,
}

impl AuthUser {
    /// Validates `token` and builds the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for invalid tokens or claims.
    pub fn from_token(jwt: &JwtManager, token: &str) -> Result<Self, ApiError> {
        let claims = jwt.validate(token)?;
        Ok(Self {
            id: claims.user_id()?,
            role: claims.role()?,
            email: claims.email,
            name: claims.name,
        })
    }

    /// Returns `true` for admins.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Requires the admin role.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] otherwise.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }

    /// Requires a role allowed to run check-in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] otherwise.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.can_check_in() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "organizer or admin role required".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        Self::from_token(&state.jwt, token)
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Self::from_token(&state.jwt, token).map(Some),
            None => Ok(None),
        }
    }
}
