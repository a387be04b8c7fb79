//! Repository layer for the deck service.
//!
//! Provides database access following the Handler -> Service -> Repository
//! architecture. `store` holds the generic table access; the other modules
//! are per-entity repositories built on it.

pub mod admins;
pub mod cards;
pub mod creators;
pub mod decks;
pub mod random_assignments;
pub mod store;

pub use admins::AdminsRepository;
pub use cards::{CardsRepository, NewCard};
pub use creators::{CreatorsRepository, NewCreator};
pub use decks::{DecksRepository, NewDeck, TransitionOutcome};
pub use random_assignments::{InsertOutcome, RandomAssignmentsRepository};
