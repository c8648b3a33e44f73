//! Bearer-token claims.

use serde::{Deserialize, Serialize};

use crate::domain::{Role, UserId};
use crate::error::ApiError;

/// Claims carried by access tokens issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, a UUID).
    pub sub: String,
    /// Email address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Role name (`ADMIN`, `ORGANIZER`, `MEMBER`).
    #[serde(default = "default_role")]
    pub role: String,
    /// Issued at (unix timestamp).
    #[serde(default)]
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

fn default_role() -> String {
    Role::Member.as_str().to_string()
}

impl Claims {
    /// Parses the subject as a user id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if `sub` is not a UUID.
    pub fn user_id(&self) -> Result<UserId, ApiError> {
        uuid::Uuid::parse_str(&self.sub)
            .map(UserId::from_uuid)
            .map_err(|_| ApiError::Unauthorized("token subject is not a user id".to_string()))
    }

    /// Parses the role claim.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for an unknown role.
    pub fn role(&self) -> Result<Role, ApiError> {
        self.role.parse().map_err(ApiError::Unauthorized)
    }
}
