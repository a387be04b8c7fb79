//! Authentication middleware.
//!
//! Provides two middleware functions:
//! - `require_auth` - Rejects requests without a valid bearer token
//! - `optional_auth` - Lets anonymous requests through, but still rejects a
//!   token that is present and invalid
//!
//! Both validate the token with [`JwtValidator`] and insert the resolved
//! [`Caller`] into request extensions.

use crate::auth::{Caller, JwtValidator};
use crate::errors::DeckError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_validator: Arc<JwtValidator>,
}

/// Extract the Bearer token from the Authorization header.
///
/// `Ok(None)` when the header is absent.
fn extract_bearer_token(req: &Request) -> Result<Option<&str>, DeckError> {
    let Some(header) = req.headers().get("authorization") else {
        return Ok(None);
    };

    let value = header.to_str().map_err(|_| {
        tracing::debug!(target: "deck.middleware.auth", "Non-ASCII Authorization header");
        DeckError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    value.strip_prefix("Bearer ").map(Some).ok_or_else(|| {
        tracing::debug!(target: "deck.middleware.auth", "Invalid Authorization header format");
        DeckError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

fn resolve_caller(state: &AuthState, token: &str) -> Result<Caller, DeckError> {
    let claims = state.jwt_validator.validate(token)?;
    Caller::from_claims(&claims)
}

/// Authentication middleware for protected routes.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Continues to the next handler with `Caller` in extensions otherwise
#[instrument(skip_all, name = "deck.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, DeckError> {
    let token = extract_bearer_token(&req)?.ok_or_else(|| {
        tracing::debug!(target: "deck.middleware.auth", "Missing Authorization header");
        DeckError::InvalidToken("Missing Authorization header".to_string())
    })?;

    let caller = resolve_caller(&state, token)?;
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}

/// Authentication middleware for routes that also serve anonymous callers.
#[instrument(skip_all, name = "deck.middleware.optional_auth")]
pub async fn optional_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, DeckError> {
    if let Some(token) = extract_bearer_token(&req)? {
        let caller = resolve_caller(&state, token)?;
        req.extensions_mut().insert(caller);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::TokenIssuer;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use common::types::Role;
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret-with-32-plus-bytes";

    async fn whoami(caller: Option<Extension<Caller>>) -> String {
        match caller {
            Some(Extension(c)) => format!("{}:{}", c.role, c.id),
            None => "anonymous".to_string(),
        }
    }

    fn app() -> Router {
        let state = Arc::new(AuthState {
            jwt_validator: Arc::new(JwtValidator::new(SECRET.as_bytes(), 300)),
        });

        Router::new()
            .route(
                "/required",
                get(whoami).route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_auth,
                )),
            )
            .route(
                "/optional",
                get(whoami).route_layer(middleware::from_fn_with_state(state, optional_auth)),
            )
    }

    fn token(role: Role, id: i64) -> String {
        TokenIssuer::new(SECRET.as_bytes(), 3600)
            .issue(id, role)
            .unwrap()
            .access_token
    }

    async fn call(uri: &str, auth: Option<String>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_require_auth_missing_header() {
        let (status, _) = call("/required", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_wrong_scheme() {
        let (status, _) = call("/required", Some("Basic abc".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_valid_token() {
        let bearer = format!("Bearer {}", token(Role::Admin, 5));
        let (status, body) = call("/required", Some(bearer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin:5");
    }

    #[tokio::test]
    async fn test_optional_auth_anonymous() {
        let (status, body) = call("/optional", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn test_optional_auth_with_token() {
        let bearer = format!("Bearer {}", token(Role::Creator, 8));
        let (status, body) = call("/optional", Some(bearer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "creator:8");
    }

    #[tokio::test]
    async fn test_optional_auth_invalid_token_rejected() {
        let (status, _) = call("/optional", Some("Bearer garbage".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
