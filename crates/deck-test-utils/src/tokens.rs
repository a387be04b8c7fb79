//! Bearer token builders for tests.
//!
//! Tokens are signed with [`TEST_JWT_SECRET`], the secret the test server
//! harness configures, so they validate against a `TestDeckServer`.

use chrono::{Duration, Utc};
use common::jwt::UserClaims;
use common::types::Role;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

/// Signing secret used by the test server configuration.
pub const TEST_JWT_SECRET: &str = "deck-test-secret-that-is-at-least-32-bytes";

/// Builder for signed test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::creator(7).expires_in(-60).build();
/// ```
pub struct TestTokenBuilder {
    claims: UserClaims,
    secret: String,
}

impl TestTokenBuilder {
    /// Token for an account with the default one hour lifetime.
    pub fn new(subject_id: i64, role: Role) -> Self {
        let now = Utc::now().timestamp();
        Self {
            claims: UserClaims::new(subject_id, role, now, 3600),
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    pub fn admin(admin_id: i64) -> Self {
        Self::new(admin_id, Role::Admin)
    }

    pub fn creator(creator_id: i64) -> Self {
        Self::new(creator_id, Role::Creator)
    }

    /// Set expiration in seconds from now (negative for an expired token).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.claims.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.claims.iat = timestamp;
        self
    }

    /// Replace the raw `sub` claim.
    pub fn with_subject(mut self, sub: &str) -> Self {
        self.claims.sub = sub.to_string();
        self
    }

    /// Sign with a different secret.
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Encode and sign the token.
    pub fn build(self) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("test token signing should succeed")
    }
}

/// Signed admin token for `admin_id`.
pub fn admin_token(admin_id: i64) -> String {
    TestTokenBuilder::admin(admin_id).build()
}

/// Signed creator token for `creator_id`.
pub fn creator_token(creator_id: i64) -> String {
    TestTokenBuilder::creator(creator_id).build()
}

/// `Authorization` header value for a token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_three_part_token() {
        let token = admin_token(1);
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_builders_differ_by_role() {
        assert_ne!(admin_token(1), creator_token(1));
    }

    #[test]
    fn test_bearer_prefix() {
        assert_eq!(bearer("abc"), "Bearer abc");
    }
}
