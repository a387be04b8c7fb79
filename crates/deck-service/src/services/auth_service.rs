//! Account registration and login.
//!
//! # Security
//!
//! - Passwords are hashed with bcrypt at the configured cost
//! - Login always runs one bcrypt verification, against a dummy hash when
//!   the email is unknown, so response time does not reveal which emails
//!   exist
//! - Unknown email and wrong password produce the same 401
//! - Emails are unique across creators and admins

use crate::auth::jwt::TokenIssuer;
use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::DeckError;
use crate::models::{
    AdminResponse, CreateAdminRequest, CreatorResponse, Gender, LoginRequest, LoginResponse,
    RegisterCreatorRequest,
};
use crate::repositories::{AdminsRepository, CreatorsRepository, NewCreator};
use chrono::NaiveDate;
use common::secret::ExposeSecret;
use common::types::Role;
use sqlx::PgPool;
use tracing::instrument;

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only looks at the first 72 bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

pub const MAX_NAME_CHARS: usize = 100;

/// Stands in for a stored hash when the email is unknown.
const DUMMY_PASSWORD_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Lowercase and trim an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email shape: `local@domain.tld` with no empty parts.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }

    let domain_parts: Vec<&str> = domain.split('.').collect();
    domain_parts.len() >= 2 && domain_parts.iter().all(|p| !p.is_empty())
}

fn validate_password(password: &str) -> Result<(), DeckError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DeckError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(DeckError::BadRequest(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

fn validate_name(name: &str, field: &str) -> Result<String, DeckError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(DeckError::BadRequest(format!(
            "{} must be between 1 and {} characters",
            field, MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// Parse a `YYYY-MM-DD` birth date that is not after `today`.
pub fn parse_birth_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, DeckError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        DeckError::BadRequest("Birth date must use the YYYY-MM-DD format".to_string())
    })?;

    if date > today {
        return Err(DeckError::BadRequest(
            "Birth date cannot be in the future".to_string(),
        ));
    }
    Ok(date)
}

/// Hash a password with bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, DeckError> {
    // Reject costs the config layer would never produce
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(DeckError::Internal(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| DeckError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, DeckError> {
    bcrypt::verify(password, hash)
        .map_err(|e| DeckError::Internal(format!("Password verification failed: {}", e)))
}

async fn ensure_email_available(pool: &PgPool, email: &str) -> Result<(), DeckError> {
    if CreatorsRepository::email_exists(pool, email).await?
        || AdminsRepository::email_exists(pool, email).await?
    {
        return Err(DeckError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }
    Ok(())
}

/// Service for account operations.
pub struct AuthService;

impl AuthService {
    /// Exchange email and password for a bearer token.
    ///
    /// Creators are looked up first, then admins.
    #[instrument(skip_all)]
    pub async fn login(
        pool: &PgPool,
        issuer: &TokenIssuer,
        request: &LoginRequest,
    ) -> Result<LoginResponse, DeckError> {
        let email = normalize_email(&request.email);

        let account = match CreatorsRepository::find_by_email(pool, &email).await? {
            Some(creator) => Some((creator.id, Role::Creator, creator.password_hash)),
            None => AdminsRepository::find_by_email(pool, &email)
                .await?
                .map(|admin| (admin.id, Role::Admin, admin.password_hash)),
        };

        // Always run bcrypt so unknown emails take as long as wrong passwords
        let password = request.password.expose_secret();
        let password_valid = match &account {
            Some((_, _, hash)) => verify_password(password, hash)?,
            None => {
                let _ = verify_password(password, DUMMY_PASSWORD_HASH);
                false
            }
        };

        let (subject_id, role) = match account {
            Some((id, role, _)) if password_valid => (id, role),
            _ => {
                tracing::debug!(target: "deck.service.auth", "Login rejected");
                return Err(DeckError::InvalidToken(
                    INVALID_CREDENTIALS_MESSAGE.to_string(),
                ));
            }
        };

        let issued = issuer.issue(subject_id, role)?;

        tracing::info!(
            target: "deck.service.auth",
            role = %role,
            "Login succeeded"
        );

        Ok(LoginResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            role,
        })
    }

    /// Register a creator account.
    ///
    /// # Errors
    ///
    /// - `DeckError::BadRequest` - Invalid name, email, password, gender or
    ///   birth date
    /// - `DeckError::Conflict` - Email already used by a creator or admin
    #[instrument(skip_all)]
    pub async fn register_creator(
        pool: &PgPool,
        request: &RegisterCreatorRequest,
        today: NaiveDate,
        bcrypt_cost: u32,
    ) -> Result<CreatorResponse, DeckError> {
        let name = validate_name(&request.name, "Name")?;

        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(DeckError::BadRequest("Invalid email format".to_string()));
        }

        validate_password(request.password.expose_secret())?;

        let gender: Gender = request
            .gender
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|msg: &'static str| DeckError::BadRequest(msg.to_string()))?;

        let birth_date = parse_birth_date(&request.birth_date, today)?;

        ensure_email_available(pool, &email).await?;

        let password_hash = hash_password(request.password.expose_secret(), bcrypt_cost)?;

        let new_creator = NewCreator {
            name,
            email,
            password_hash,
            gender,
            birth_date,
        };
        let row = CreatorsRepository::create(pool, &new_creator).await?;

        tracing::info!(
            target: "deck.service.auth",
            creator_id = row.id,
            "Creator registered"
        );

        Ok(CreatorResponse {
            id: row.id,
            name: row.name,
            email: row.email,
            gender,
            birth_date: row.birth_date,
        })
    }

    /// Create another admin account. Callers must already be admins.
    #[instrument(skip_all)]
    pub async fn create_admin(
        pool: &PgPool,
        request: &CreateAdminRequest,
        bcrypt_cost: u32,
    ) -> Result<AdminResponse, DeckError> {
        let display_name = validate_name(&request.display_name, "Display name")?;

        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(DeckError::BadRequest("Invalid email format".to_string()));
        }

        validate_password(request.password.expose_secret())?;

        ensure_email_available(pool, &email).await?;

        let password_hash = hash_password(request.password.expose_secret(), bcrypt_cost)?;
        let row = AdminsRepository::create(pool, &email, &password_hash, &display_name).await?;

        tracing::info!(
            target: "deck.service.auth",
            admin_id = row.id,
            "Admin created"
        );

        Ok(AdminResponse::from(row))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@sub.example.com"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_password_length_requirement() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"p".repeat(72)).is_ok());
        assert!(validate_password(&"p".repeat(73)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ada ", "Name").unwrap(), "Ada");
        assert!(validate_name("   ", "Name").is_err());
        assert!(validate_name(&"n".repeat(101), "Name").is_err());
    }

    #[test]
    fn test_parse_birth_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        assert_eq!(
            parse_birth_date("2000-02-29", today).unwrap(),
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()
        );
        assert_eq!(parse_birth_date("2026-10-18", today).unwrap(), today);
        assert!(parse_birth_date("2026-10-19", today).is_err());
        assert!(parse_birth_date("18/10/2000", today).is_err());
        assert!(parse_birth_date("2001-02-29", today).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse", MIN_BCRYPT_COST).unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_rejects_bad_cost() {
        assert!(hash_password("password", MIN_BCRYPT_COST - 1).is_err());
        assert!(hash_password("password", MAX_BCRYPT_COST + 1).is_err());
    }
}
