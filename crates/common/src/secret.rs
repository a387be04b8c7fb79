//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for account passwords and the
//! token signing key. `SecretString` implements `Debug` with redaction, so a
//! request struct that derives `Debug` stays safe to log through tracing.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     email: "alice@example.com".to_string(),
//!     password: SecretString::from("hunter22"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter22"));
//! let password: &str = req.password.expose_secret();
//! assert_eq!(password, "hunter22");
//! ```
//!
//! Use `SecretString` for:
//! - Account passwords in login and registration bodies
//! - The JWT signing secret
//! - Issued bearer tokens held by test harnesses

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_login_body() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Credentials {
            email: String,
            password: SecretString,
        }

        let json = r#"{"email": "bob@example.com", "password": "my-secret-value"}"#;
        let creds: Credentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.password.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
