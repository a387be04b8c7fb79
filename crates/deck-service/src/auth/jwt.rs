//! Bearer token issuing and validation.
//!
//! Tokens are HS256 JWTs signed with the shared `JWT_SECRET` and carrying
//! [`UserClaims`] (`sub`, `role`, `iat`, `exp`).
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted
//! - Expiration and issued-at claims are validated with clock skew tolerance
//! - Generic error messages prevent information leakage

use crate::errors::DeckError;
use common::jwt::{check_token_size, validate_iat, UserClaims};
use common::types::Role;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// A freshly signed token.
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Signs access tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl_seconds: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    /// Sign a token for an account.
    #[instrument(skip_all, fields(role = %role))]
    pub fn issue(&self, subject_id: i64, role: Role) -> Result<IssuedToken, DeckError> {
        let now = chrono::Utc::now().timestamp();
        let claims = UserClaims::new(subject_id, role, now, self.ttl_seconds);

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!(target: "deck.auth.jwt", error = %e, "Token signing failed");
                DeckError::Internal(format!("token signing failed: {}", e))
            })?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.ttl_seconds,
        })
    }
}

/// Validates incoming bearer tokens.
pub struct JwtValidator {
    decoding_key: DecodingKey,

    /// Clock skew tolerance in seconds for iat validation.
    clock_skew_seconds: i64,
}

impl JwtValidator {
    pub fn new(secret: &[u8], clock_skew_seconds: i64) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            clock_skew_seconds,
        }
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Verify HS256 signature
    /// 3. Validate exp claim (reject expired tokens)
    /// 4. Validate iat claim with clock skew tolerance
    /// 5. `sub` must be a positive account id
    ///
    /// # Errors
    ///
    /// Returns `DeckError::InvalidToken` for all validation failures with a
    /// generic message to prevent information leakage.
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<UserClaims, DeckError> {
        check_token_size(token).map_err(|e| {
            tracing::debug!(target: "deck.auth.jwt", error = ?e, "Token size check failed");
            DeckError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(target: "deck.auth.jwt", error = %e, "Token verification failed");
                DeckError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
            })?;
        let claims = token_data.claims;

        let skew = Duration::from_secs(self.clock_skew_seconds.unsigned_abs());
        if let Err(e) = validate_iat(claims.iat, skew) {
            tracing::debug!(target: "deck.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(DeckError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
        }

        if claims.subject_id().is_err() {
            return Err(DeckError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()));
        }

        tracing::debug!(target: "deck.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}
