//! # Deck Test Utilities
//!
//! Shared test utilities for the deck service.
//!
//! This crate provides:
//! - Server test harness (`TestDeckServer` for E2E tests)
//! - Token builders (`admin_token`, `creator_token`)
//! - Seed fixtures for accounts, decks and cards
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deck_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     let server = TestDeckServer::spawn(pool).await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/api/v1/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod tokens;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
pub use tokens::*;
