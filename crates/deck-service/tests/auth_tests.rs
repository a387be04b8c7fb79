//! Account and authentication integration tests.
//!
//! - `POST /api/v1/creators` - public creator registration
//! - `POST /api/v1/auth/login` - email/password login for either role
//! - `POST /api/v1/admins` - admin creation (admin only)
//!
//! Also checks bearer token handling on protected routes.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use chrono::Utc;
use deck_test_utils::{
    admin_token, bearer, creator_token, seed_admin, seed_creator, TestDeckServer,
    TestTokenBuilder, TEST_PASSWORD,
};
use serde_json::{json, Value};
use sqlx::PgPool;

fn registration(email: &str) -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": email,
        "password": "analytical-engine",
        "gender": "female",
        "birth_date": "1990-12-10",
    })
}

async fn login(server: &TestDeckServer, email: &str, password: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(server.api("/auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await?)
}

// ============================================================================
// Registration and login
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_then_login_as_creator(pool: PgPool) -> Result<()> {
    let server = TestDeckServer::spawn(pool).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.api("/creators"))
        .json(&registration("Ada@Example.com"))
        .send()
        .await?;
    assert_eq!(response.status(), 201);

    let creator: Value = response.json().await?;
    assert_eq!(creator["email"], "ada@example.com");
    assert_eq!(creator["gender"], "female");
    assert!(creator.get("password_hash").is_none());

    let response = login(&server, "ada@example.com", "analytical-engine").await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["role"], "creator");
    assert!(body["expires_in"].as_i64().unwrap() > 0);

    // The issued token is accepted on a creator route
    let token = body["access_token"].as_str().unwrap();
    let response = client
        .get(server.api("/cards/creator"))
        .header("Authorization", bearer(token))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_login_as_admin(pool: PgPool) -> Result<()> {
    seed_admin(&pool, "root@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = login(&server, "ROOT@example.com", TEST_PASSWORD).await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["role"], "admin");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_email_is_rejected(pool: PgPool) -> Result<()> {
    seed_admin(&pool, "taken@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;
    let client = reqwest::Client::new();

    // Emails are unique across both account kinds
    let response = client
        .post(server.api("/creators"))
        .json(&registration("taken@example.com"))
        .send()
        .await?;
    assert_eq!(response.status(), 409);

    let response = client
        .post(server.api("/creators"))
        .json(&registration("fresh@example.com"))
        .send()
        .await?;
    assert_eq!(response.status(), 201);

    let response = client
        .post(server.api("/creators"))
        .json(&registration("FRESH@example.com"))
        .send()
        .await?;
    assert_eq!(response.status(), 409);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_registration_validation(pool: PgPool) -> Result<()> {
    let server = TestDeckServer::spawn(pool).await?;
    let client = reqwest::Client::new();

    let mut bad_email = registration("not-an-email");
    bad_email["name"] = json!("Bad Email");

    let mut short_password = registration("short@example.com");
    short_password["password"] = json!("1234567");

    let mut bad_gender = registration("gender@example.com");
    bad_gender["gender"] = json!("unknown");

    let mut future_birth = registration("future@example.com");
    future_birth["birth_date"] = json!("2999-01-01");

    for body in [bad_email, short_password, bad_gender, future_birth] {
        let response = client.post(server.api("/creators")).json(&body).send().await?;
        assert_eq!(response.status(), 400, "body {} should be rejected", body);
    }

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_wrong_password_and_unknown_email_look_the_same(pool: PgPool) -> Result<()> {
    seed_creator(&pool, "player@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let wrong_password = login(&server, "player@example.com", "not-the-password").await?;
    assert_eq!(wrong_password.status(), 401);
    let wrong_password: Value = wrong_password.json().await?;

    let unknown_email = login(&server, "nobody@example.com", TEST_PASSWORD).await?;
    assert_eq!(unknown_email.status(), 401);
    let unknown_email: Value = unknown_email.json().await?;

    assert_eq!(wrong_password, unknown_email);

    Ok(())
}

// ============================================================================
// Admin creation
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_admin_can_create_admin(pool: PgPool) -> Result<()> {
    let admin_id = seed_admin(&pool, "root@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .post(server.api("/admins"))
        .header("Authorization", bearer(&admin_token(admin_id)))
        .json(&json!({
            "email": "second@example.com",
            "password": "another-long-password",
            "display_name": "Second",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 201);

    let response = login(&server, "second@example.com", "another-long-password").await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_creator_cannot_create_admin(pool: PgPool) -> Result<()> {
    let creator_id = seed_creator(&pool, "player@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .post(server.api("/admins"))
        .header("Authorization", bearer(&creator_token(creator_id)))
        .json(&json!({
            "email": "sneaky@example.com",
            "password": "another-long-password",
            "display_name": "Sneaky",
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 403);

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    Ok(())
}

// ============================================================================
// Bearer token handling
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_missing_token_returns_401(pool: PgPool) -> Result<()> {
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .get(server.api("/cards/admin"))
        .send()
        .await?;
    assert_eq!(response.status(), 401);
    assert!(response.headers().contains_key("www-authenticate"));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_expired_token_returns_401(pool: PgPool) -> Result<()> {
    let admin_id = seed_admin(&pool, "root@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let token = TestTokenBuilder::admin(admin_id)
        .issued_at(Utc::now().timestamp() - 7200)
        .expires_in(-3600)
        .build();

    let response = reqwest::Client::new()
        .get(server.api("/cards/admin"))
        .header("Authorization", bearer(&token))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_token_signed_with_other_secret_returns_401(pool: PgPool) -> Result<()> {
    let admin_id = seed_admin(&pool, "root@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let token = TestTokenBuilder::admin(admin_id)
        .signed_with("a-completely-different-secret-of-32-bytes")
        .build();

    let response = reqwest::Client::new()
        .get(server.api("/cards/admin"))
        .header("Authorization", bearer(&token))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_non_bearer_scheme_returns_401(pool: PgPool) -> Result<()> {
    let admin_id = seed_admin(&pool, "root@example.com").await;
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::Client::new()
        .get(server.api("/cards/admin"))
        .header("Authorization", format!("Basic {}", admin_token(admin_id)))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    Ok(())
}
