//! GitHub REST and OAuth client
//!
//! Quirks:
//! - The token endpoint answers a bad code with 200 and an `error` field.
//! - OAuth App tokens do not expire and come without a refresh token.
//! - Scopes are space-separated in the authorize URL but comma-separated
//!   in the token response.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use url::Url;

use super::models::{
    AccessToken, AccessTokenResponse, GitHubErrorBody, GitHubUser, Repository, RepositoryPage,
    RepositoryUpdate,
};
use crate::config::AppConfig;
use crate::error::AppError;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Sort orders `GET /user/repos` understands
pub const REPOSITORY_SORTS: [&str; 4] = ["created", "updated", "pushed", "full_name"];

/// Client for the endpoints this service proxies
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    oauth_base: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl GitHubClient {
    /// Build client from configuration
    ///
    /// # Errors
    /// Returns error if a base URL is invalid or the HTTP client
    /// cannot be constructed
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(config.github.user_agent.clone())
            .timeout(Duration::from_secs(config.github.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        let api_base = parse_base(&config.github.api_url, "github.api_url")?;
        let oauth_base = parse_base(&config.github.oauth_url, "github.oauth_url")?;

        Ok(Self {
            http,
            api_base,
            oauth_base,
            client_id: config.auth.github.client_id.clone(),
            client_secret: config.auth.github.client_secret.clone(),
            redirect_uri: config.oauth_callback_url(),
            scopes: config.auth.github.scopes.clone(),
        })
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Consent screen URL the user is redirected to
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = join(&self.oauth_base, &["login", "oauth", "authorize"]);
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        url.to_string()
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError> {
        let url = join(&self.oauth_base, &["login", "oauth", "access_token"]);
        let started = Instant::now();

        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("token request failed: {e}")))?;
        record("exchange_code", response.status(), started);

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::OAuthExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::OAuthExchange(format!("unreadable token response: {e}")))?;

        if let Some(error) = token.error {
            let description = token.error_description.unwrap_or_default();
            return Err(AppError::OAuthExchange(format!("{error}: {description}")));
        }

        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::OAuthExchange("token response without access_token".into()))?;

        Ok(AccessToken {
            access_token,
            token_type: token.token_type.unwrap_or_else(|| "bearer".to_string()),
            scope: token.scope,
        })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Authenticated user, typed
    pub async fn fetch_user(&self, token: &str) -> Result<GitHubUser, AppError> {
        let url = join(&self.api_base, &["user"]);
        self.get_json("fetch_user", url, token).await
    }

    /// Authenticated user, as GitHub sent it
    pub async fn fetch_user_profile(&self, token: &str) -> Result<serde_json::Value, AppError> {
        let url = join(&self.api_base, &["user"]);
        self.get_json("fetch_user_profile", url, token).await
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// One page of the repositories the user can access
    pub async fn list_repositories(
        &self,
        token: &str,
        page: u32,
        per_page: u32,
        sort: &str,
    ) -> Result<RepositoryPage, AppError> {
        let mut url = join(&self.api_base, &["user", "repos"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string())
            .append_pair("sort", sort);

        let response = self
            .send("list_repositories", self.request(Method::GET, url, token))
            .await?;

        let link = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let repositories: Vec<Repository> = response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("failed to parse repository list: {e}"))
        })?;

        Ok(RepositoryPage { repositories, link })
    }

    /// `PATCH /repos/{owner}/{repo}`
    pub async fn update_repository(
        &self,
        token: &str,
        owner: &str,
        name: &str,
        update: &RepositoryUpdate,
    ) -> Result<Repository, AppError> {
        let url = self.repository_url(owner, name)?;
        let response = self
            .send(
                "update_repository",
                self.request(Method::PATCH, url, token).json(update),
            )
            .await?;

        response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "failed to parse updated repository {owner}/{name}: {e}"
            ))
        })
    }

    /// `DELETE /repos/{owner}/{repo}`
    pub async fn delete_repository(
        &self,
        token: &str,
        owner: &str,
        name: &str,
    ) -> Result<(), AppError> {
        let url = self.repository_url(owner, name)?;
        self.send("delete_repository", self.request(Method::DELETE, url, token))
            .await?;
        Ok(())
    }

    fn repository_url(&self, owner: &str, name: &str) -> Result<Url, AppError> {
        validate_repository_segment("owner", owner)?;
        validate_repository_segment("name", name)?;
        Ok(join(&self.api_base, &["repos", owner, name]))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .send(operation, self.request(Method::GET, url, token))
            .await?;
        response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("failed to parse {operation} response: {e}"))
        })
    }

    /// Send a request and translate the status code
    ///
    /// - 401: the stored token is no longer accepted
    /// - other non-2xx: upstream error carrying GitHub's message
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, AppError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "GitHub request failed");
            AppError::HttpClient(e)
        })?;
        let status = response.status();
        record(operation, status, started);

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(operation, "GitHub rejected the stored token");
            return Err(AppError::TokenExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GitHubErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            tracing::warn!(operation, status = status.as_u16(), %message, "GitHub API error");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

fn parse_base(raw: &str, key: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw).map_err(|e| AppError::Config(format!("{key}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!("{key} cannot be used as a base URL")));
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one
fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Check an owner or repository name before it becomes a path segment
///
/// GitHub names use letters, digits, `-`, `_` and `.`; anything else
/// cannot name a repository and is refused without calling GitHub.
pub fn validate_repository_segment(field: &str, value: &str) -> Result<(), AppError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value.len() <= 100
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else if value.is_empty() {
        Err(AppError::Validation(format!("Repository {field} is required")))
    } else {
        Err(AppError::Validation(format!(
            "Invalid repository {field}: {value}"
        )))
    }
}

fn record(operation: &'static str, status: StatusCode, started: Instant) {
    use crate::metrics::{GITHUB_REQUEST_DURATION_SECONDS, GITHUB_REQUESTS_TOTAL};

    GITHUB_REQUESTS_TOTAL
        .with_label_values(&[operation, status.as_str()])
        .inc();
    GITHUB_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
}
