//! Common test utilities for E2E tests
//!
//! `TestServer` runs the real router against `FakeGitHub`, a local axum
//! server answering the handful of GitHub endpoints the service calls.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use repokeeper::{AppState, config};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// GitHub user id the fake answers `/user` with
pub const GITHUB_USER_ID: u64 = 4242;
pub const GITHUB_LOGIN: &str = "octocat";

/// Code the fake token endpoint accepts
pub const GOOD_CODE: &str = "good-code";
/// Token the fake token endpoint hands out
pub const ISSUED_TOKEN: &str = "gho_issued";
/// Token the fake API rejects with 401
pub const REVOKED_TOKEN: &str = "gho_revoked";

/// Repositories the fake user owns
pub const REPOSITORY_COUNT: u32 = 95;

/// Request counters of the fake GitHub
#[derive(Default)]
pub struct Hits {
    /// Calls to the token endpoint
    pub exchange: AtomicUsize,
    /// Calls to the REST API
    pub api: AtomicUsize,
    in_flight: AtomicUsize,
    /// Largest number of concurrent repository mutations observed
    pub max_in_flight: AtomicUsize,
    /// Names archived through PATCH
    archived: Mutex<HashSet<String>>,
}

impl Hits {
    pub fn exchange(&self) -> usize {
        self.exchange.load(Ordering::SeqCst)
    }

    pub fn api(&self) -> usize {
        self.api.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Local stand-in for github.com and api.github.com
pub struct FakeGitHub {
    pub addr: String,
    pub hits: Arc<Hits>,
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let hits = Arc::new(Hits::default());

        let app = Router::new()
            .route("/login/oauth/access_token", post(fake_access_token))
            .route("/user", get(fake_user))
            .route("/user/repos", get(fake_user_repos))
            .route(
                "/repos/:owner/:name",
                patch(fake_update_repository).delete(fake_delete_repository),
            )
            .with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: FakeGitHub,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let github = FakeGitHub::start().await;
        let config = test_config(&github.addr);

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let app = repokeeper::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for servers to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            state,
            github,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Signed session token for the fake GitHub user
    pub fn session_token(&self) -> String {
        use chrono::{Duration, Utc};
        use repokeeper::auth::{Session, create_session_token};

        let session = Session {
            github_id: GITHUB_USER_ID,
            github_username: GITHUB_LOGIN.to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
        };

        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Store a GitHub token for the fake user
    pub async fn store_github_token(&self, access_token: &str) {
        use repokeeper::store::ProviderToken;

        self.state
            .tokens
            .store(ProviderToken {
                user_id: GITHUB_USER_ID,
                username: GITHUB_LOGIN.to_string(),
                access_token: access_token.to_string(),
                token_type: "bearer".to_string(),
                scope: Some("repo,delete_repo".to_string()),
                obtained_at: chrono::Utc::now(),
            })
            .await;
    }

    /// Session token of a user whose GitHub token is stored
    pub async fn logged_in(&self) -> String {
        self.store_github_token("gho_stored").await;
        self.session_token()
    }
}

/// Configuration pointing every GitHub URL at the fake
pub fn test_config(github_addr: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            public_url: "http://localhost:8080".to_string(),
        },
        frontend: config::FrontendConfig {
            url: "http://localhost:3000".to_string(),
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 3600,
            state_ttl_seconds: 600,
            github: config::GitHubOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                callback_url: None,
                scopes: vec!["repo".to_string(), "delete_repo".to_string()],
            },
        },
        github: config::GitHubApiConfig {
            api_url: github_addr.to_string(),
            oauth_url: github_addr.to_string(),
            user_agent: "repokeeper-tests".to_string(),
            timeout_seconds: 5,
            bulk_concurrency: 4,
            bulk_max_items: 100,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

// =============================================================================
// Fake GitHub handlers
// =============================================================================

#[derive(Deserialize)]
struct TokenForm {
    code: String,
}

async fn fake_access_token(
    State(hits): State<Arc<Hits>>,
    Form(form): Form<TokenForm>,
) -> Json<Value> {
    hits.exchange.fetch_add(1, Ordering::SeqCst);

    if form.code == GOOD_CODE {
        Json(json!({
            "access_token": ISSUED_TOKEN,
            "token_type": "bearer",
            "scope": "repo,delete_repo",
        }))
    } else {
        // GitHub reports a bad code with 200
        Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired.",
        }))
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn reject_revoked(headers: &HeaderMap) -> Option<Response> {
    match bearer(headers) {
        Some(token) if token != REVOKED_TOKEN => None,
        _ => Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Bad credentials" })),
            )
                .into_response(),
        ),
    }
}

fn repository_json(id: u64, owner: &str, name: &str, private: bool, archived: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "private": private,
        "archived": archived,
        "owner": { "login": owner, "id": GITHUB_USER_ID },
        "html_url": format!("https://github.com/{owner}/{name}"),
        "stargazers_count": 3,
    })
}

async fn fake_user(State(hits): State<Arc<Hits>>, headers: HeaderMap) -> Response {
    hits.api.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = reject_revoked(&headers) {
        return rejection;
    }

    Json(json!({
        "id": GITHUB_USER_ID,
        "login": GITHUB_LOGIN,
        "name": "The Octocat",
        "email": null,
        "avatar_url": "https://github.com/images/error/octocat_happy.gif",
        "html_url": "https://github.com/octocat",
        "public_repos": 8,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ReposQuery {
    page: u32,
    per_page: u32,
    sort: String,
}

async fn fake_user_repos(
    State(hits): State<Arc<Hits>>,
    headers: HeaderMap,
    Query(query): Query<ReposQuery>,
) -> Response {
    hits.api.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = reject_revoked(&headers) {
        return rejection;
    }
    assert!(!query.sort.is_empty());

    let last_page = REPOSITORY_COUNT.div_ceil(query.per_page);
    let start = (query.page - 1) * query.per_page;
    let end = (start + query.per_page).min(REPOSITORY_COUNT);
    let archived = hits.archived.lock().unwrap().clone();
    let repositories: Vec<Value> = (start..end)
        .map(|i| {
            let name = format!("repo-{i}");
            let is_archived = archived.contains(&name);
            repository_json(u64::from(i) + 1, GITHUB_LOGIN, &name, false, is_archived)
        })
        .collect();

    let page_url = |page: u32| {
        format!(
            "<https://api.github.com/user/repos?page={page}&per_page={}>",
            query.per_page
        )
    };
    let mut links = Vec::new();
    if query.page < last_page {
        links.push(format!(r#"{}; rel="next""#, page_url(query.page + 1)));
        links.push(format!(r#"{}; rel="last""#, page_url(last_page)));
    }
    if query.page > 1 {
        links.push(format!(r#"{}; rel="prev""#, page_url(query.page - 1)));
        links.push(format!(r#"{}; rel="first""#, page_url(1)));
    }

    let mut response = Json(repositories).into_response();
    if !links.is_empty() {
        response
            .headers_mut()
            .insert(header::LINK, links.join(", ").parse().unwrap());
    }
    response
}

#[derive(Deserialize)]
struct UpdateBody {
    private: Option<bool>,
    archived: Option<bool>,
}

/// Names with special behaviour:
/// - `missing`: 404
/// - `locked`: 403
/// - `garbled`: 200 with a body that is not a repository
/// - `broken`: 500
async fn fake_update_repository(
    State(hits): State<Arc<Hits>>,
    headers: HeaderMap,
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<UpdateBody>,
) -> Response {
    hits.api.fetch_add(1, Ordering::SeqCst);
    let in_flight = hits.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    hits.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(20)).await;
    hits.in_flight.fetch_sub(1, Ordering::SeqCst);

    if let Some(rejection) = reject_revoked(&headers) {
        return rejection;
    }

    match name.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response(),
        "locked" => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Must have admin rights to Repository." })),
        )
            .into_response(),
        "garbled" => (StatusCode::OK, "<html>surprise</html>").into_response(),
        "broken" => server_error(),
        _ => {
            let mut archived = hits.archived.lock().unwrap();
            match body.archived {
                Some(true) => {
                    archived.insert(name.clone());
                }
                Some(false) => {
                    archived.remove(&name);
                }
                None => {}
            }
            Json(repository_json(
                7,
                &owner,
                &name,
                body.private.unwrap_or(false),
                archived.contains(&name),
            ))
            .into_response()
        }
    }
}

async fn fake_delete_repository(
    State(hits): State<Arc<Hits>>,
    headers: HeaderMap,
    Path((_owner, name)): Path<(String, String)>,
) -> Response {
    hits.api.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = reject_revoked(&headers) {
        return rejection;
    }

    match name.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response(),
        "broken" => server_error(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server Error" })),
    )
        .into_response()
}
