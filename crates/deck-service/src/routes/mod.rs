//! HTTP routes for the deck service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwtValidator, TokenIssuer};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, optional_auth, require_auth, AuthState};
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Signs access tokens at login.
    pub token_issuer: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let token_issuer = Arc::new(TokenIssuer::new(
            config.jwt_secret_bytes(),
            config.token_ttl_seconds,
        ));
        Self {
            pool,
            config,
            token_issuer,
        }
    }
}

/// Build the application routes.
///
/// Everything lives under `/api/v1`:
/// - `/health`, `/metrics`, `/auth/login`, `POST /creators`,
///   `PATCH /decks/like/{id}` - public
/// - `GET /decks` - optional authentication, response depends on role
/// - everything else - authentication required, roles checked in handlers
///
/// Layers: TraceLayer, 30 second timeout, HTTP metrics (outermost).
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let jwt_validator = Arc::new(JwtValidator::new(
        state.config.jwt_secret_bytes(),
        state.config.jwt_clock_skew_seconds,
    ));
    let auth_state = Arc::new(AuthState { jwt_validator });

    let public_routes = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/creators", post(handlers::register_creator))
        .route("/api/v1/decks/like/:id", patch(handlers::like_deck))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/api/v1/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let listing_routes = Router::new()
        .route("/api/v1/decks", get(handlers::list_decks))
        .route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            optional_auth,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/v1/admins", post(handlers::create_admin))
        .route("/api/v1/decks", post(handlers::create_deck))
        .route(
            "/api/v1/decks/:id",
            patch(handlers::update_deck).delete(handlers::delete_deck),
        )
        .route(
            "/api/v1/decks/:id/status",
            patch(handlers::transition_status),
        )
        .route("/api/v1/decks/:id/cards", post(handlers::submit_card))
        .route("/api/v1/cards/admin", get(handlers::list_cards_for_admin))
        .route(
            "/api/v1/cards/creator",
            get(handlers::list_cards_for_creator),
        )
        .route("/api/v1/cards/:id", delete(handlers::delete_card))
        .route(
            "/api/v1/carte/aleatoire/deck/:deck_id",
            post(handlers::get_random_card),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(listing_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
