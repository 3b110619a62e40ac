//! Repokeeper - backend for managing a GitHub user's repositories in bulk
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - GitHub OAuth login / logout                              │
//! │  - Repository list, update, delete, bulk operations         │
//! │  - Metrics                                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Pagination totals                                        │
//! │  - Bounded bulk fan-out with per-item results               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  GitHub + in-memory stores                   │
//! │  - REST client (reqwest)                                    │
//! │  - Provider tokens keyed by GitHub user id                  │
//! │  - Pending OAuth state values                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `github`: GitHub REST/OAuth client and pagination helpers
//! - `store`: In-memory provider token store
//! - `auth`: GitHub OAuth authentication and sessions
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod github;
pub mod metrics;
pub mod service;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the GitHub client and the token store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// GitHub REST/OAuth client
    pub github: Arc<github::GitHubClient>,

    /// Repository operations (single and bulk)
    pub repositories: Arc<service::RepositoryService>,

    /// GitHub access tokens keyed by GitHub user id
    pub tokens: Arc<store::TokenStore>,

    /// Outstanding OAuth `state` values
    pub oauth_states: Arc<auth::OAuthStateStore>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the GitHub client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let github = Arc::new(github::GitHubClient::from_config(&config)?);
        let repositories = Arc::new(service::RepositoryService::new(
            github.clone(),
            config.github.bulk_concurrency,
            config.github.bulk_max_items,
        ));
        let oauth_states = auth::OAuthStateStore::new(Duration::from_secs(
            config.auth.state_ttl_seconds,
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            github,
            repositories,
            tokens: Arc::new(store::TokenStore::new()),
            oauth_states: Arc::new(oauth_states),
        })
    }

    /// GitHub token stored for the session's user
    ///
    /// # Errors
    /// `ProviderTokenMissing` when the user has to log in again
    pub async fn provider_token(
        &self,
        session: &auth::Session,
    ) -> Result<store::ProviderToken, error::AppError> {
        self.tokens.get(session.github_id).await.ok_or_else(|| {
            tracing::debug!(user_id = session.github_id, "No GitHub token stored");
            error::AppError::ProviderTokenMissing
        })
    }

    /// Forget the stored token once GitHub has rejected it
    ///
    /// `result` is passed through unchanged; the next request of the
    /// user then reports the missing token instead of calling GitHub.
    pub async fn forget_rejected_token<T>(
        &self,
        token: &store::ProviderToken,
        result: Result<T, error::AppError>,
    ) -> Result<T, error::AppError> {
        if matches!(result, Err(error::AppError::TokenExpired)) {
            self.tokens
                .remove_rejected(token.user_id, &token.access_token)
                .await;
        }
        result
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.frontend);

    let metrics_routes = api::metrics_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router(state.clone()))
        .merge(metrics_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(frontend: &config::FrontendConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let allowed_origin = frontend.url.trim_end_matches('/');
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => layer.allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from frontend URL; denying cross-origin requests"
            );
            layer
        }
    }
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "message": "GitHub Repository Manager API",
    }))
}
