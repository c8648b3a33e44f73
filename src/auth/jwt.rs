//! JWT validation (and issuance for tooling and tests).

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::claims::Claims;
use crate::domain::User;
use crate::error::ApiError;

/// Validates HS256 bearer tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager").finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Creates a manager for the given secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issues a token for `user` valid for `ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if encoding fails.
    pub fn issue(&self, user: &User, ttl_secs: i64) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.full_name.clone(),
            role: user.role.as_str().to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for a malformed, forged or expired
    /// token.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserId};

    fn user() -> User {
        User::new(
            UserId::new(),
            "ada@example.org".to_string(),
            "Ada Obi".to_string(),
            Role::Organizer,
        )
    }

    #[test]
    fn issue_and_validate() {
        let jwt = JwtManager::new(b"test-secret");
        let user = user();
        let Ok(token) = jwt.issue(&user, 3600) else {
            panic!("issue failed");
        };
        let Ok(claims) = jwt.validate(&token) else {
            panic!("validate failed");
        };
        assert_eq!(claims.user_id().ok(), Some(user.id));
        assert_eq!(claims.role().ok(), Some(Role::Organizer));
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let Ok(token) = JwtManager::new(b"one").issue(&user(), 3600) else {
            panic!("issue failed");
        };
        assert!(matches!(
            JwtManager::new(b"two").validate(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_fails_validation() {
        let jwt = JwtManager::new(b"test-secret");
        let Ok(token) = jwt.issue(&user(), -3600) else {
            panic!("issue failed");
        };
        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn debug_hides_keys() {
        assert_eq!(format!("{:?}", JwtManager::new(b"s")), "JwtManager { .. }");
    }
}
