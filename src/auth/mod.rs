//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the external identity provider;
//! [`AuthUser`] validates them per request and exposes role checks.

pub mod claims;
pub mod extractor;
pub mod jwt;

pub use claims::Claims;
pub use extractor::AuthUser;
pub use jwt::JwtManager;
