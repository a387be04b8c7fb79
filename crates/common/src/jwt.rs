//! JWT utilities shared by the deck service and its test harness.
//!
//! This module provides:
//! - Size limits for oversized-token rejection
//! - Clock skew constants for iat validation
//! - iat validation logic
//! - The user token claims structure
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Generic error messages prevent information leakage
//! - The `sub` field in claims is redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! check_token_size(token)?;
//! // ... verify signature, decode UserClaims ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 decoding or
/// signature verification. A user token issued by this service is roughly
/// 200 bytes.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Default token lifetime in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3600;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Error messages are intentionally generic. Detailed information is logged
/// at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Claims Types
// =============================================================================

/// User token claims.
///
/// `sub` holds the numeric id of the admin or creator, rendered as a string
/// as RFC 7519 requires. It is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject (account id) - redacted in Debug output.
    pub sub: String,

    /// Which account table `sub` refers to.
    pub role: Role,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("sub", &"[REDACTED]")
            .field("role", &self.role)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl UserClaims {
    /// Build claims for `subject_id` valid for `ttl_seconds` from `now`.
    #[must_use]
    pub fn new(subject_id: i64, role: Role, now: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: subject_id.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// Parse `sub` back into the account id.
    ///
    /// # Errors
    ///
    /// Returns `MalformedToken` if `sub` is not a positive integer.
    pub fn subject_id(&self) -> Result<i64, JwtValidationError> {
        match self.sub.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => {
                tracing::debug!(target: "common.jwt", "Token rejected: sub is not an account id");
                Err(JwtValidationError::MalformedToken)
            }
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn is_creator(&self) -> bool {
        self.role == Role::Creator
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens over [`MAX_JWT_SIZE_BYTES`] before any parsing.
///
/// # Errors
///
/// Returns `TokenTooLarge` when the token exceeds the limit.
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens whose `iat` lies more than `clock_skew` in the future.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is
/// more than `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // check_token_size Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_token_size_at_limit_accepted() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES);
        assert!(check_token_size(&token).is_ok());
    }

    #[test]
    fn test_check_token_size_oversized_rejected() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            check_token_size(&token),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let past = chrono::Utc::now().timestamp() - 3600; // 1 hour ago
        assert!(validate_iat(past, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        let result = validate_iat(far_future, DEFAULT_CLOCK_SKEW);
        assert!(matches!(result, Err(JwtValidationError::IatTooFarInFuture)));
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        assert!(matches!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    // -------------------------------------------------------------------------
    // UserClaims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_user_claims_debug_redacts_sub() {
        let claims = UserClaims::new(4242, Role::Creator, 1_700_000_000, 3600);
        let debug_str = format!("{claims:?}");

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("4242"));
        assert!(debug_str.contains("Creator"));
    }

    #[test]
    fn test_user_claims_new_sets_expiry() {
        let claims = UserClaims::new(7, Role::Admin, 1_700_000_000, 3600);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);
        assert!(claims.is_admin());
        assert!(!claims.is_creator());
    }

    #[test]
    fn test_user_claims_role_serializes_lowercase() {
        let claims = UserClaims::new(7, Role::Creator, 1_700_000_000, 3600);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["role"], "creator");
        assert_eq!(json["sub"], "7");
    }

    #[test]
    fn test_subject_id_rejects_non_numeric() {
        let mut claims = UserClaims::new(7, Role::Creator, 0, 3600);
        assert_eq!(claims.subject_id(), Ok(7));

        claims.sub = "alice".to_string();
        assert_eq!(
            claims.subject_id(),
            Err(JwtValidationError::MalformedToken)
        );

        claims.sub = "-3".to_string();
        assert_eq!(
            claims.subject_id(),
            Err(JwtValidationError::MalformedToken)
        );
    }
}
