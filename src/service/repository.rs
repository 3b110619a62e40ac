//! Repository service
//!
//! Runs repository operations against GitHub with a user's token,
//! one repository at a time or in bulk.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::github::pagination::{TotalEstimate, estimate_total};
use crate::github::{GitHubClient, Repository, RepositoryUpdate, validate_repository_segment};
use crate::store::ProviderToken;

/// Repository addressed by owner and name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A page of repositories with the estimated total
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    pub repositories: Vec<Repository>,
    pub page: u32,
    pub per_page: u32,
    pub total: TotalEstimate,
}

/// Outcome for one repository of a bulk request
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    pub repository: String,
    pub success: bool,
    /// HTTP status GitHub answered with, when a call was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a bulk update
#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateSummary {
    pub updated: Vec<Repository>,
    pub errors: Vec<String>,
    pub results: Vec<BulkItemResult>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Serialize)]
pub struct BulkDeleteSummary {
    /// `owner/name` of every deleted repository
    pub deleted: Vec<String>,
    pub errors: Vec<String>,
    pub results: Vec<BulkItemResult>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// Repository service
pub struct RepositoryService {
    github: Arc<GitHubClient>,
    /// Upstream calls in flight per bulk request
    bulk_concurrency: usize,
    /// Largest accepted bulk request
    bulk_max_items: usize,
}

impl RepositoryService {
    /// Create new repository service
    pub fn new(github: Arc<GitHubClient>, bulk_concurrency: usize, bulk_max_items: usize) -> Self {
        Self {
            github,
            bulk_concurrency: bulk_concurrency.max(1),
            bulk_max_items: bulk_max_items.max(1),
        }
    }

    /// List one page of the user's repositories
    ///
    /// The total is derived from the `Link` header and is only an
    /// estimate when more pages follow.
    pub async fn list(
        &self,
        token: &ProviderToken,
        page: u32,
        per_page: u32,
        sort: &str,
    ) -> Result<RepositoryListing, AppError> {
        let result = self
            .github
            .list_repositories(&token.access_token, page, per_page, sort)
            .await?;

        let total = estimate_total(
            result.link.as_deref(),
            page,
            per_page,
            result.repositories.len(),
        );

        tracing::debug!(
            user_id = token.user_id,
            page,
            per_page,
            returned = result.repositories.len(),
            total = total.total,
            approximate = total.approximate,
            "Fetched repositories"
        );

        Ok(RepositoryListing {
            repositories: result.repositories,
            page,
            per_page,
            total,
        })
    }

    /// Change visibility and/or archive flag of one repository
    pub async fn update(
        &self,
        token: &ProviderToken,
        repository: &RepositoryRef,
        update: &RepositoryUpdate,
    ) -> Result<Repository, AppError> {
        if update.is_empty() {
            return Err(AppError::Validation("No update data provided".to_string()));
        }

        let updated = self
            .github
            .update_repository(
                &token.access_token,
                &repository.owner,
                &repository.name,
                update,
            )
            .await?;

        tracing::info!(
            user_id = token.user_id,
            owner = %repository.owner,
            repo = %repository.name,
            private = ?update.private,
            archived = ?update.archived,
            "Updated repository"
        );
        Ok(updated)
    }

    /// Delete one repository
    pub async fn delete(
        &self,
        token: &ProviderToken,
        repository: &RepositoryRef,
    ) -> Result<(), AppError> {
        self.github
            .delete_repository(&token.access_token, &repository.owner, &repository.name)
            .await?;

        tracing::info!(
            user_id = token.user_id,
            owner = %repository.owner,
            repo = %repository.name,
            "Deleted repository"
        );
        Ok(())
    }

    /// Apply the same update to many repositories
    ///
    /// Every repository gets its own result; a failing repository does
    /// not stop the others.
    pub async fn bulk_update(
        &self,
        token: &ProviderToken,
        repositories: Vec<RepositoryRef>,
        update: RepositoryUpdate,
    ) -> Result<BulkUpdateSummary, AppError> {
        self.check_batch(&repositories)?;
        if update.is_empty() {
            return Err(AppError::Validation("No update data provided".to_string()));
        }

        let total = repositories.len();
        let outcomes = self
            .fan_out(repositories, |repository| async move {
                self.github
                    .update_repository(
                        &token.access_token,
                        &repository.owner,
                        &repository.name,
                        &update,
                    )
                    .await
            })
            .await;

        let mut summary = BulkUpdateSummary {
            updated: Vec::new(),
            errors: Vec::new(),
            results: Vec::with_capacity(total),
            total,
            success: 0,
            failed: 0,
        };

        for (repository, outcome) in outcomes {
            match outcome {
                Ok(updated) => {
                    summary.updated.push(updated);
                    summary.results.push(BulkItemResult::succeeded(&repository, 200));
                }
                Err(error) => {
                    summary.errors.push(describe_failure(&repository, &error));
                    summary.results.push(BulkItemResult::failed(&repository, &error));
                }
            }
        }
        summary.success = summary.updated.len();
        summary.failed = summary.errors.len();

        record_bulk("update", summary.success, summary.failed);
        tracing::info!(
            user_id = token.user_id,
            total,
            success = summary.success,
            failed = summary.failed,
            "Bulk update completed"
        );

        Ok(summary)
    }

    /// Delete many repositories
    ///
    /// Every repository gets its own result; a failing repository does
    /// not stop the others.
    pub async fn bulk_delete(
        &self,
        token: &ProviderToken,
        repositories: Vec<RepositoryRef>,
    ) -> Result<BulkDeleteSummary, AppError> {
        self.check_batch(&repositories)?;

        let total = repositories.len();
        let outcomes = self
            .fan_out(repositories, |repository| async move {
                self.github
                    .delete_repository(&token.access_token, &repository.owner, &repository.name)
                    .await
            })
            .await;

        let mut summary = BulkDeleteSummary {
            deleted: Vec::new(),
            errors: Vec::new(),
            results: Vec::with_capacity(total),
            total,
            success: 0,
            failed: 0,
        };

        for (repository, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    summary.deleted.push(repository.to_string());
                    summary.results.push(BulkItemResult::succeeded(&repository, 204));
                }
                Err(error) => {
                    summary.errors.push(describe_failure(&repository, &error));
                    summary.results.push(BulkItemResult::failed(&repository, &error));
                }
            }
        }
        summary.success = summary.deleted.len();
        summary.failed = summary.errors.len();

        record_bulk("delete", summary.success, summary.failed);
        tracing::info!(
            user_id = token.user_id,
            total,
            success = summary.success,
            failed = summary.failed,
            "Bulk delete completed"
        );

        Ok(summary)
    }

    fn check_batch(&self, repositories: &[RepositoryRef]) -> Result<(), AppError> {
        if repositories.is_empty() {
            return Err(AppError::Validation(
                "No repositories specified".to_string(),
            ));
        }
        if repositories.len() > self.bulk_max_items {
            return Err(AppError::Validation(format!(
                "Too many repositories: at most {} per request",
                self.bulk_max_items
            )));
        }
        Ok(())
    }

    /// Run `op` for every repository, keeping input order
    ///
    /// Repositories with an invalid owner or name fail without an
    /// upstream call.
    async fn fan_out<'a, T, F, Fut>(
        &'a self,
        repositories: Vec<RepositoryRef>,
        op: F,
    ) -> Vec<(RepositoryRef, Result<T, AppError>)>
    where
        F: Fn(RepositoryRef) -> Fut + 'a,
        Fut: Future<Output = Result<T, AppError>> + 'a,
    {
        let op = &op;
        stream::iter(repositories)
            .map(|repository| async move {
                let outcome = match validate_ref(&repository) {
                    Ok(()) => op(repository.clone()).await,
                    Err(error) => Err(error),
                };
                (repository, outcome)
            })
            .buffered(self.bulk_concurrency)
            .collect()
            .await
    }
}

impl BulkItemResult {
    fn succeeded(repository: &RepositoryRef, status: u16) -> Self {
        Self {
            repository: repository.to_string(),
            success: true,
            status: Some(status),
            error: None,
        }
    }

    fn failed(repository: &RepositoryRef, error: &AppError) -> Self {
        let status = match error {
            AppError::Upstream { status, .. } => Some(*status),
            AppError::TokenExpired => Some(401),
            _ => None,
        };
        Self {
            repository: repository.to_string(),
            success: false,
            status,
            error: Some(error.to_string()),
        }
    }
}

fn validate_ref(repository: &RepositoryRef) -> Result<(), AppError> {
    validate_repository_segment("owner", &repository.owner)?;
    validate_repository_segment("name", &repository.name)
}

fn describe_failure(repository: &RepositoryRef, error: &AppError) -> String {
    match error {
        AppError::Upstream { status, message } => {
            format!("GitHub API error for {repository}: {status} - {message}")
        }
        AppError::TokenExpired => format!("GitHub API error for {repository}: 401 - token expired"),
        AppError::Validation(message) => format!("Skipped {repository}: {message}"),
        other => format!("Failed to process {repository}: {other}"),
    }
}

fn record_bulk(operation: &str, success: usize, failed: usize) {
    use crate::metrics::BULK_ITEMS_TOTAL;

    BULK_ITEMS_TOTAL
        .with_label_values(&[operation, "success"])
        .inc_by(success as u64);
    BULK_ITEMS_TOTAL
        .with_label_values(&[operation, "failed"])
        .inc_by(failed as u64);
}
