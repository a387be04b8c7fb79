//! Authentication module for the deck service.
//!
//! # Components
//!
//! - `jwt` - HS256 token issuing and validation
//! - `claims` - Token claims and caller role checks

pub mod claims;
pub mod jwt;

pub use claims::{Caller, UserClaims};
pub use jwt::{IssuedToken, JwtValidator, TokenIssuer};
