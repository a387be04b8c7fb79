//! Random card assignment integration tests.
//!
//! - `POST /api/v1/carte/aleatoire/deck/{deck_id}` - draw (or re-read) the
//!   caller's card for a deck
//!
//! Concurrency is exercised at the service layer so many draws for the same
//! (deck, creator) pair race against one database.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use deck_service::errors::DeckError;
use deck_service::models::CardAuthor;
use deck_service::repositories::{CardsRepository, InsertOutcome, RandomAssignmentsRepository};
use deck_service::services::RandomAssignmentService;
use deck_test_utils::{
    admin_token, bearer, creator_token, days_from_today, seed_admin, seed_card, seed_creator,
    seed_deck, TestDeckServer,
};
use futures::future::join_all;
use sqlx::PgPool;
use std::collections::HashSet;

struct Seeded {
    deck_id: i64,
    creator_id: i64,
    card_ids: Vec<i64>,
}

/// One deck with `cards` admin-authored cards and one creator who wrote none.
async fn seed_deck_with_cards(pool: &PgPool, cards: usize) -> Seeded {
    let admin_id = seed_admin(pool, "admin@example.com").await;
    let creator_id = seed_creator(pool, "player@example.com").await;
    let deck_id = seed_deck(pool, admin_id, days_from_today(-10), days_from_today(10), 20).await;

    let mut card_ids = Vec::with_capacity(cards);
    for _ in 0..cards {
        card_ids.push(seed_card(pool, deck_id, CardAuthor::Admin(admin_id)).await);
    }

    Seeded {
        deck_id,
        creator_id,
        card_ids,
    }
}

fn draw_url(server: &TestDeckServer, deck_id: i64) -> String {
    server.api(&format!("/carte/aleatoire/deck/{}", deck_id))
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_draw_is_stable_for_same_creator(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 5).await;
    let server = TestDeckServer::spawn(pool).await?;
    let client = reqwest::Client::new();
    let auth = bearer(&creator_token(seeded.creator_id));

    let mut drawn = HashSet::new();
    for _ in 0..5 {
        let response = client
            .post(draw_url(&server, seeded.deck_id))
            .header("Authorization", &auth)
            .send()
            .await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["deck_id"], seeded.deck_id);
        drawn.insert(body["id"].as_i64().unwrap());
    }

    assert_eq!(drawn.len(), 1, "repeated draws must return the same card");
    let card_id = drawn.into_iter().next().unwrap();
    assert!(seeded.card_ids.contains(&card_id));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_at_most_one_assignment_per_creator_and_deck(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 3).await;

    for _ in 0..3 {
        RandomAssignmentService::get_or_assign_card(&pool, seeded.deck_id, seeded.creator_id)
            .await?;
    }

    let (rows,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM random_assignments WHERE deck_id = $1 AND creator_id = $2",
    )
    .bind(seeded.deck_id)
    .bind(seeded.creator_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(rows, 1);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_draws_agree_on_one_card(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 8).await;

    let draws = (0..10).map(|_| {
        let pool = pool.clone();
        async move {
            RandomAssignmentService::get_or_assign_card(&pool, seeded.deck_id, seeded.creator_id)
                .await
        }
    });
    let results = join_all(draws).await;

    let card_ids: HashSet<i64> = results
        .into_iter()
        .map(|r| r.expect("concurrent draw should succeed").id)
        .collect();
    assert_eq!(card_ids.len(), 1, "racing draws returned {:?}", card_ids);

    let stored = RandomAssignmentsRepository::find(&pool, seeded.deck_id, seeded.creator_id)
        .await?
        .expect("assignment should be persisted");
    assert!(card_ids.contains(&stored.card_id));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_different_creators_draw_independently(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 4).await;
    let other_creator = seed_creator(&pool, "second@example.com").await;

    let first =
        RandomAssignmentService::get_or_assign_card(&pool, seeded.deck_id, seeded.creator_id)
            .await?;
    let second =
        RandomAssignmentService::get_or_assign_card(&pool, seeded.deck_id, other_creator).await?;

    assert!(seeded.card_ids.contains(&first.id));
    assert!(seeded.card_ids.contains(&second.id));

    let (rows,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM random_assignments WHERE deck_id = $1")
            .bind(seeded.deck_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(rows, 2);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_draw_from_empty_deck_returns_404(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 0).await;
    let server = TestDeckServer::spawn(pool.clone()).await?;

    let response = reqwest::Client::new()
        .post(draw_url(&server, seeded.deck_id))
        .header("Authorization", bearer(&creator_token(seeded.creator_id)))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    // Nothing is persisted for a failed draw
    let stored =
        RandomAssignmentsRepository::find(&pool, seeded.deck_id, seeded.creator_id).await?;
    assert!(stored.is_none());

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_draw_from_unknown_deck_returns_404(pool: PgPool) -> Result<()> {
    let creator_id = seed_creator(&pool, "player@example.com").await;

    let result = RandomAssignmentService::get_or_assign_card(&pool, 999_999, creator_id).await;
    assert!(matches!(result, Err(DeckError::NotFound(_))));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_deleting_assigned_card_allows_fresh_draw(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 3).await;
    let server = TestDeckServer::spawn(pool.clone()).await?;
    let client = reqwest::Client::new();
    let admin_id = seed_admin(&pool, "moderator@example.com").await;

    let first =
        RandomAssignmentService::get_or_assign_card(&pool, seeded.deck_id, seeded.creator_id)
            .await?;

    let response = client
        .delete(server.api(&format!("/cards/{}", first.id)))
        .header("Authorization", bearer(&admin_token(admin_id)))
        .send()
        .await?;
    assert_eq!(response.status(), 204);

    // The binding went with the card
    let stored =
        RandomAssignmentsRepository::find(&pool, seeded.deck_id, seeded.creator_id).await?;
    assert!(stored.is_none());

    let response = client
        .post(draw_url(&server, seeded.deck_id))
        .header("Authorization", bearer(&creator_token(seeded.creator_id)))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await?;
    let redrawn = body["id"].as_i64().unwrap();
    assert_ne!(redrawn, first.id);
    assert!(seeded.card_ids.contains(&redrawn));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_admin_cannot_draw(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 2).await;
    let admin_id = seed_admin(&pool, "moderator@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .post(draw_url(&server, seeded.deck_id))
        .header("Authorization", bearer(&admin_token(admin_id)))
        .send()
        .await?;
    assert_eq!(response.status(), 403);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_draw_requires_authentication(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 2).await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .post(draw_url(&server, seeded.deck_id))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

// ============================================================================
// Insert-if-absent outcomes
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_if_absent_keeps_first_card(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 2).await;
    let first_card = *seeded.card_ids.first().unwrap();
    let second_card = *seeded.card_ids.last().unwrap();

    let outcome = RandomAssignmentsRepository::insert_if_absent(
        &pool,
        seeded.deck_id,
        seeded.creator_id,
        first_card,
    )
    .await?;
    assert!(
        matches!(outcome, InsertOutcome::Inserted(ref row) if row.card_id == first_card),
        "first insert should write a row, got {:?}",
        outcome
    );

    // A second insert for the same pair loses and writes nothing
    let outcome = RandomAssignmentsRepository::insert_if_absent(
        &pool,
        seeded.deck_id,
        seeded.creator_id,
        second_card,
    )
    .await?;
    assert_eq!(outcome, InsertOutcome::AlreadyAssigned);

    let stored = RandomAssignmentsRepository::find(&pool, seeded.deck_id, seeded.creator_id)
        .await?
        .expect("assignment should be persisted");
    assert_eq!(stored.card_id, first_card);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_if_absent_with_deleted_card(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 2).await;
    let gone = *seeded.card_ids.first().unwrap();
    assert!(CardsRepository::delete(&pool, gone).await?);

    let outcome =
        RandomAssignmentsRepository::insert_if_absent(&pool, seeded.deck_id, seeded.creator_id, gone)
            .await?;
    assert_eq!(outcome, InsertOutcome::CardMissing);

    let stored =
        RandomAssignmentsRepository::find(&pool, seeded.deck_id, seeded.creator_id).await?;
    assert!(stored.is_none());

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insert_if_absent_with_unknown_creator(pool: PgPool) -> Result<()> {
    let seeded = seed_deck_with_cards(&pool, 1).await;

    let result = RandomAssignmentsRepository::insert_if_absent(
        &pool,
        seeded.deck_id,
        999_999,
        *seeded.card_ids.first().unwrap(),
    )
    .await;
    assert!(matches!(result, Err(DeckError::NotFound(_))));

    Ok(())
}
