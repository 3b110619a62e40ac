//! Request and response DTOs
//!
//! Shapes of the JSON bodies accepted and returned by the repository API.

use axum::extract::FromRequest;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::github::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::github::{REPOSITORY_SORTS, Repository, RepositoryUpdate};
use crate::service::{BulkDeleteSummary, BulkUpdateSummary, RepositoryListing, RepositoryRef};

const DEFAULT_SORT: &str = "updated";

/// JSON body extractor that rejects with `AppError`
///
/// Malformed bodies answer with the usual `{"error": ...}` JSON instead
/// of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

// =============================================================================
// Requests
// =============================================================================

/// Query of GET /api/repositories
///
/// Values are kept as strings so that garbage falls back to defaults
/// instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListRepositoriesQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
}

impl ListRepositoriesQuery {
    /// Page number, at least 1
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1)
    }

    /// Page size clamped to 1..=100
    pub fn per_page(&self) -> u32 {
        self.per_page
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(|size| size.clamp(1, MAX_PAGE_SIZE as i64) as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Sort key understood by GitHub
    pub fn sort(&self) -> &str {
        self.sort
            .as_deref()
            .map(str::trim)
            .filter(|sort| REPOSITORY_SORTS.contains(sort))
            .unwrap_or(DEFAULT_SORT)
    }
}

/// Body of PATCH /api/repositories/:id
#[derive(Debug, Deserialize)]
pub struct UpdateRepositoryRequest {
    pub owner: String,
    pub name: String,
    pub private: Option<bool>,
    pub archived: Option<bool>,
}

impl UpdateRepositoryRequest {
    pub fn repository(&self) -> RepositoryRef {
        RepositoryRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }

    pub fn update(&self) -> RepositoryUpdate {
        RepositoryUpdate {
            private: self.private,
            archived: self.archived,
        }
    }
}

/// Body of DELETE /api/repositories/:id
#[derive(Debug, Deserialize)]
pub struct DeleteRepositoryRequest {
    pub owner: String,
    pub name: String,
}

/// Body of POST /api/repositories/bulk-update
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    #[serde(default)]
    pub repositories: Vec<RepositoryRef>,
    #[serde(default)]
    pub updates: RepositoryUpdate,
}

/// Body of POST /api/repositories/bulk-delete
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub repositories: Vec<RepositoryRef>,
}

// =============================================================================
// Responses
// =============================================================================

/// `{"data": ...}` envelope, optionally with a message
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// `{"message": ...}` body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Page of repositories with pagination info
#[derive(Debug, Serialize)]
pub struct RepositoryListResponse {
    pub data: Vec<Repository>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    /// False only when the total is known exactly
    pub total_is_estimate: bool,
}

impl From<RepositoryListing> for RepositoryListResponse {
    fn from(listing: RepositoryListing) -> Self {
        Self {
            data: listing.repositories,
            pagination: PaginationInfo {
                page: listing.page,
                per_page: listing.per_page,
                total: listing.total.total,
                total_is_estimate: listing.total.approximate,
            },
        }
    }
}

pub fn bulk_update_message(summary: &BulkUpdateSummary) -> String {
    format!(
        "Bulk update completed: {} success, {} failed",
        summary.success, summary.failed
    )
}

pub fn bulk_delete_message(summary: &BulkDeleteSummary) -> String {
    format!(
        "Bulk delete completed: {} success, {} failed",
        summary.success, summary.failed
    )
}
