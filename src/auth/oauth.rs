//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::Deserialize;
use url::Url;

use super::session::{Session, create_session_token};
use crate::AppState;
use crate::error::AppError;
use crate::store::ProviderToken;

const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_COOKIE_PATH: &str = "/api/auth";

/// Create authentication router
///
/// Routes:
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/callback - OAuth callback
/// - POST /auth/logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/github", get(github_redirect))
        .route("/auth/callback", get(github_callback))
        .route("/auth/logout", post(logout))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// GET /api/auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state server-side and in a cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = state.oauth_states.issue().await;
    let cookie = build_state_cookie(&csrf_state, state.config.should_use_secure_cookies());
    let location = state.github.authorize_url(&csrf_state);

    tracing::debug!("Redirecting to GitHub consent screen");

    Ok((jar.add(cookie), Redirect::to(&location)))
}

/// Query parameters from GitHub callback
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user declined or GitHub refused the request
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /api/auth/callback
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user info from GitHub
/// 4. Store the GitHub token under the user's id
/// 5. Create session
/// 6. Redirect to the frontend with the session token
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GitHubCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::metrics::OAUTH_LOGINS_TOTAL;

    if let Err(error) = verify_csrf_state(query.state.as_deref(), &jar, &state).await {
        OAUTH_LOGINS_TOTAL.with_label_values(&["invalid_state"]).inc();
        return Err(error);
    }
    let jar = jar.remove(clear_state_cookie());

    if let Some(error) = query.error.as_deref() {
        OAUTH_LOGINS_TOTAL.with_label_values(&["denied"]).inc();
        let description = query.error_description.as_deref().unwrap_or(error);
        return Err(AppError::Validation(format!(
            "GitHub authorization failed: {description}"
        )));
    }

    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("Authorization code not provided".to_string()))?;

    let access_token = state.github.exchange_code(code).await.inspect_err(|error| {
        OAUTH_LOGINS_TOTAL.with_label_values(&["exchange_failed"]).inc();
        tracing::warn!(%error, "Failed to exchange code for token");
    })?;

    let user = state
        .github
        .fetch_user(&access_token.access_token)
        .await
        .inspect_err(|error| {
            OAUTH_LOGINS_TOTAL.with_label_values(&["user_lookup_failed"]).inc();
            tracing::warn!(%error, "Failed to get user info");
        })?;

    let replaced = state
        .tokens
        .store(ProviderToken {
            user_id: user.id,
            username: user.login.clone(),
            access_token: access_token.access_token,
            token_type: access_token.token_type,
            scope: access_token.scope,
            obtained_at: Utc::now(),
        })
        .await;

    let session = Session::for_user(&user, state.config.auth.session_max_age);
    let session_token = create_session_token(&session, &state.config.auth.session_secret)?;

    OAUTH_LOGINS_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(
        user_id = user.id,
        username = %user.login,
        replaced_token = replaced,
        "User logged in with GitHub"
    );

    let location = frontend_callback_location(&state.config.frontend.url, &session_token)?;
    Ok((jar, Redirect::to(&location)))
}

// =============================================================================
// Logout
// =============================================================================

/// POST /api/auth/logout
///
/// Sessions are stateless; the frontend drops its token.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(clear_state_cookie()),
        Json(serde_json::json!({
            "message": "Logged out successfully",
        })),
    )
}

// =============================================================================
// Helpers
// =============================================================================

fn build_state_cookie(value: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, value.to_string()))
        .path(OAUTH_STATE_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_state_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path(OAUTH_STATE_COOKIE_PATH)
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}

/// Verify CSRF state from the callback
///
/// The value must match the cookie set on this browser and must be a
/// live, unused value issued by this server.
async fn verify_csrf_state(
    query_state: Option<&str>,
    jar: &CookieJar,
    state: &AppState,
) -> Result<(), AppError> {
    let invalid = || AppError::Validation("Invalid state parameter".to_string());

    let query_state = query_state.filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let cookie_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value())
        .ok_or_else(invalid)?;

    if cookie_state != query_state {
        tracing::warn!("OAuth state does not match cookie");
        return Err(invalid());
    }

    if !state.oauth_states.consume(query_state).await {
        tracing::warn!("OAuth state unknown, expired or already used");
        return Err(invalid());
    }

    Ok(())
}

fn frontend_callback_location(frontend_url: &str, session_token: &str) -> Result<String, AppError> {
    let mut url = Url::parse(frontend_url)
        .map_err(|e| AppError::Config(format!("frontend.url is not a valid URL: {e}")))?;
    let path = format!("{}/auth/callback", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut().clear().append_pair("token", session_token);
    Ok(url.to_string())
}
