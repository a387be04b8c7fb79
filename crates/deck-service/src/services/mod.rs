//! Service layer for the deck service.
//!
//! Business rules live here; handlers only parse and authorize, and
//! repositories only run queries.
//!
//! # Components
//!
//! - `auth_service` - Creator registration, admin creation and login
//! - `card_submission` - Card submission and card listings
//! - `deck_lifecycle` - Deck scheduling, status, playability, likes, deletion
//! - `random_assignment` - One persistent random card per creator and deck

pub mod auth_service;
pub mod card_submission;
pub mod deck_lifecycle;
pub mod random_assignment;

pub use auth_service::AuthService;
pub use card_submission::CardSubmissionService;
pub use deck_lifecycle::DeckLifecycleService;
pub use random_assignment::RandomAssignmentService;
