//! GitHub API payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user as returned by `GET /user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
}

/// Repository owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Repository as returned by the REST API
///
/// Only the fields this service acts on are typed; everything else
/// GitHub sends is kept in `extra` and relayed untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    pub owner: RepositoryOwner,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields of a repository this service may change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl RepositoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.private.is_none() && self.archived.is_none()
    }
}

/// Reply of the token endpoint
///
/// GitHub answers a bad code with HTTP 200 and an `error` field, so
/// every field is optional.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Access token obtained from a code exchange
#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub scope: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// One page of `GET /user/repos`
#[derive(Debug, Clone)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    /// Raw `Link` header, if GitHub sent one
    pub link: Option<String>,
}

/// Error body GitHub sends with non-2xx answers
#[derive(Debug, Deserialize)]
pub(crate) struct GitHubErrorBody {
    pub message: Option<String>,
}
