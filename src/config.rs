//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub frontend: FrontendConfig,
    pub auth: AuthConfig,
    pub github: GitHubApiConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Externally visible URL of this backend (e.g., "https://api.example.com")
    pub public_url: String,
}

/// Frontend the user is sent back to after login
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Frontend origin, also the only allowed CORS origin
    pub url: String,
}

/// Authentication configuration (GitHub OAuth)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 86400 = 1 day)
    pub session_max_age: i64,
    /// Lifetime of an OAuth `state` value in seconds (default: 600)
    pub state_ttl_seconds: u64,
    pub github: GitHubOAuthConfig,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with the OAuth app.
    ///
    /// Defaults to `{server.public_url}/api/auth/callback`.
    pub callback_url: Option<String>,
    /// Scopes requested at the consent screen
    pub scopes: Vec<String>,
}

/// Upstream GitHub API settings
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubApiConfig {
    /// REST API base (default: https://api.github.com)
    pub api_url: String,
    /// OAuth base (default: https://github.com)
    pub oauth_url: String,
    pub user_agent: String,
    /// Upstream request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum upstream calls in flight for one bulk request
    pub bulk_concurrency: usize,
    /// Maximum repositories accepted in one bulk request
    pub bulk_max_items: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        format!("repokeeper={},tower_http=debug", self.level.to_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (REPOKEEPER__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default("frontend.url", "http://localhost:3000")?
            .set_default("auth.session_max_age", 86400)?
            .set_default("auth.state_ttl_seconds", 600)?
            .set_default(
                "auth.github.scopes",
                vec!["repo", "user:email", "read:org", "delete_repo"],
            )?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("github.oauth_url", "https://github.com")?
            .set_default(
                "github.user_agent",
                concat!("repokeeper/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("github.timeout_seconds", 30)?
            .set_default("github.bulk_concurrency", 4)?
            .set_default("github.bulk_max_items", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (REPOKEEPER__*)
            .add_source(
                Environment::with_prefix("REPOKEEPER")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.github.scopes")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Redirect URI sent to GitHub and used during code exchange
    pub fn oauth_callback_url(&self) -> String {
        self.auth.github.callback_url.clone().unwrap_or_else(|| {
            format!(
                "{}/api/auth/callback",
                self.server.public_url.trim_end_matches('/')
            )
        })
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        url::Url::parse(&self.server.public_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.state_ttl_seconds == 0 {
            return Err(AppError::Config(
                "auth.state_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.auth.github.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "auth.github.client_id is required".to_string(),
            ));
        }

        for (key, value) in [
            ("server.public_url", self.server.public_url.as_str()),
            ("frontend.url", self.frontend.url.as_str()),
            ("github.api_url", self.github.api_url.as_str()),
            ("github.oauth_url", self.github.oauth_url.as_str()),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        let callback_url = self.oauth_callback_url();
        url::Url::parse(&callback_url).map_err(|e| {
            AppError::Config(format!("auth.github.callback_url is not a valid URL: {e}"))
        })?;

        if self.github.bulk_concurrency == 0 {
            return Err(AppError::Config(
                "github.bulk_concurrency must be at least 1".to_string(),
            ));
        }

        if self.github.bulk_max_items == 0 {
            return Err(AppError::Config(
                "github.bulk_max_items must be at least 1".to_string(),
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {})",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {})",
                self.logging.format
            )));
        }

        Ok(())
    }
}
