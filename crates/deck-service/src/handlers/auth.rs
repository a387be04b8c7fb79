//! Account handlers.
//!
//! - `POST /api/v1/auth/login` - Exchange email and password for a token
//! - `POST /api/v1/creators` - Register a creator (public)
//! - `POST /api/v1/admins` - Create an admin (admin only)

use crate::auth::Caller;
use crate::errors::DeckError;
use crate::handlers::{observe, parse_json_body};
use crate::models::{
    AdminResponse, CreateAdminRequest, CreatorResponse, LoginRequest, LoginResponse,
    RegisterCreatorRequest,
};
use crate::routes::AppState;
use crate::services::AuthService;
use axum::{body::Bytes, extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/auth/login
///
/// # Response
///
/// - 200 OK: Token issued
/// - 400 Bad Request: Malformed body
/// - 401 Unauthorized: Unknown email or wrong password (indistinguishable)
#[instrument(skip_all, name = "deck.auth.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, DeckError> {
    let request: LoginRequest = parse_json_body(&body, "login")?;
    let response = observe(
        "login",
        AuthService::login(&state.pool, &state.token_issuer, &request).await,
    )?;
    Ok(Json(response))
}

/// Handler for POST /api/v1/creators
///
/// # Response
///
/// - 201 Created: Creator registered
/// - 400 Bad Request: Invalid fields
/// - 409 Conflict: Email already in use
#[instrument(skip_all, name = "deck.auth.register_creator")]
pub async fn register_creator(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatorResponse>), DeckError> {
    let request: RegisterCreatorRequest = parse_json_body(&body, "register_creator")?;
    let today = Utc::now().date_naive();
    let creator = observe(
        "register_creator",
        AuthService::register_creator(&state.pool, &request, today, state.config.bcrypt_cost)
            .await,
    )?;
    Ok((StatusCode::CREATED, Json(creator)))
}

/// Handler for POST /api/v1/admins
///
/// # Response
///
/// - 201 Created: Admin created
/// - 403 Forbidden: Caller is not an admin
/// - 409 Conflict: Email already in use
#[instrument(skip_all, name = "deck.auth.create_admin")]
pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<(StatusCode, Json<AdminResponse>), DeckError> {
    observe("create_admin", caller.require_admin())?;
    let request: CreateAdminRequest = parse_json_body(&body, "create_admin")?;
    let admin = observe(
        "create_admin",
        AuthService::create_admin(&state.pool, &request, state.config.bcrypt_cost).await,
    )?;
    Ok((StatusCode::CREATED, Json(admin)))
}
