//! Authentication middleware
//!
//! Protects routes that require authentication.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use super::session::{Session, verify_session_token};
use crate::AppState;
use crate::error::AppError;

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    verify_session_token(token, &state.config.auth.session_secret)
}

/// Middleware to require authentication
///
/// Verifies the session token from the Authorization header and adds
/// the `Session` to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/repositories", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = authenticate(request.headers(), &state)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Extractor for current authenticated user
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.github_username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let app_state = AppState::from_ref(state);
        let session = authenticate(&parts.headers, &app_state)?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}
