//! Claims carried by deck service bearer tokens.
//!
//! The claim type is shared with other crates through `common::jwt`; this
//! module adds the request-side helpers handlers use to authorize callers.

use crate::errors::DeckError;
pub use common::jwt::UserClaims;
use common::types::Role;

/// Caller identity resolved from validated claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn from_claims(claims: &UserClaims) -> Result<Self, DeckError> {
        let id = claims.subject_id().map_err(|_| {
            DeckError::InvalidToken("The access token is invalid or expired".to_string())
        })?;
        Ok(Self {
            id,
            role: claims.role,
        })
    }

    /// Admin id, or 403 for any other role.
    pub fn require_admin(&self) -> Result<i64, DeckError> {
        match self.role {
            Role::Admin => Ok(self.id),
            Role::Creator => Err(DeckError::Forbidden(
                "This action requires an admin account".to_string(),
            )),
        }
    }

    /// Creator id, or 403 for any other role.
    pub fn require_creator(&self) -> Result<i64, DeckError> {
        match self.role {
            Role::Creator => Ok(self.id),
            Role::Admin => Err(DeckError::Forbidden(
                "This action requires a creator account".to_string(),
            )),
        }
    }
}
