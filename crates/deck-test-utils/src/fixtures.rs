//! Seed data for integration tests.
//!
//! Fixtures write through the service's repositories so seeded rows go
//! through the same constraints as production writes. Passwords are hashed
//! at the minimum bcrypt cost to keep tests fast.

use chrono::{Duration, NaiveDate, Utc};
use deck_service::models::{CardAuthor, Choice, Gender};
use deck_service::repositories::{
    AdminsRepository, CardsRepository, CreatorsRepository, DecksRepository, NewCard, NewCreator,
    NewDeck,
};
use sqlx::PgPool;

/// Password of every seeded account.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Card text that satisfies the length rules.
pub const SAMPLE_CARD_TEXT: &str =
    "A merchant caravan asks to camp inside the walls for the winter season.";

fn test_hash() -> String {
    bcrypt::hash(TEST_PASSWORD, 4).expect("bcrypt hashing should succeed")
}

/// Today's date in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `today() + days`.
pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub fn sample_choice(label: &str) -> Choice {
    Choice {
        label: label.to_string(),
        population: 3,
        finance: -2,
    }
}

/// Insert an admin and return its id.
pub async fn seed_admin(pool: &PgPool, email: &str) -> i64 {
    AdminsRepository::create(pool, email, &test_hash(), "Test Admin")
        .await
        .expect("seeding admin should succeed")
        .id
}

/// Insert a creator and return its id.
pub async fn seed_creator(pool: &PgPool, email: &str) -> i64 {
    let new_creator = NewCreator {
        name: "Test Creator".to_string(),
        email: email.to_string(),
        password_hash: test_hash(),
        gender: Gender::Other,
        birth_date: NaiveDate::from_ymd_opt(1995, 6, 15).expect("valid date"),
    };
    CreatorsRepository::create(pool, &new_creator)
        .await
        .expect("seeding creator should succeed")
        .id
}

/// Insert a deck directly (no overlap check) and return its id.
pub async fn seed_deck(
    pool: &PgPool,
    admin_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    card_capacity: i32,
) -> i64 {
    let new_deck = NewDeck {
        title: format!("Deck {}..{}", start_date, end_date),
        start_date,
        end_date,
        card_capacity,
        owner_admin_id: admin_id,
    };
    DecksRepository::create(pool, &new_deck)
        .await
        .expect("seeding deck should succeed")
        .id
}

/// Insert a card directly with the next submission order and return its id.
pub async fn seed_card(pool: &PgPool, deck_id: i64, author: CardAuthor) -> i64 {
    let submission_order = CardsRepository::next_submission_order(pool, deck_id)
        .await
        .expect("next submission order should succeed");
    let new_card = NewCard {
        deck_id,
        author,
        text: SAMPLE_CARD_TEXT.to_string(),
        choice1: sample_choice("Let them in"),
        choice2: sample_choice("Turn them away"),
        submission_order,
    };
    CardsRepository::insert(pool, &new_card)
        .await
        .expect("seeding card should succeed")
        .id
}

/// JSON body of a valid card submission.
pub fn card_body() -> serde_json::Value {
    serde_json::json!({
        "text": SAMPLE_CARD_TEXT,
        "choice1": { "label": "Let them in", "population": 5, "finance": -3 },
        "choice2": { "label": "Turn them away", "population": -2, "finance": 1 }
    })
}
