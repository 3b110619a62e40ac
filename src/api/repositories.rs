//! Repository endpoints

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch, post},
};

use super::dto::{
    AppJson, BulkDeleteRequest, BulkUpdateRequest, DataResponse, DeleteRepositoryRequest,
    ListRepositoriesQuery, MessageResponse, RepositoryListResponse, UpdateRepositoryRequest,
    bulk_delete_message, bulk_update_message,
};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::github::Repository;
use crate::service::{BulkDeleteSummary, BulkUpdateSummary, RepositoryRef};

/// Create repository router
///
/// Every route expects an authenticated session.
pub fn repositories_router() -> Router<AppState> {
    Router::new()
        .route("/repositories", get(list_repositories))
        .route("/repositories/bulk-update", post(bulk_update))
        .route("/repositories/bulk-delete", post(bulk_delete))
        .route(
            "/repositories/:id",
            patch(update_repository).delete(delete_repository),
        )
}

/// GET /api/repositories
/// List the user's repositories, one page at a time
async fn list_repositories(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<ListRepositoriesQuery>,
) -> Result<Json<DataResponse<RepositoryListResponse>>, AppError> {
    let token = state.provider_token(&session).await?;

    let listing = state
        .repositories
        .list(&token, query.page(), query.per_page(), query.sort())
        .await;
    let listing = state.forget_rejected_token(&token, listing).await?;

    Ok(Json(DataResponse::new(listing.into())))
}

/// PATCH /api/repositories/:id
/// Change visibility and/or archive flag
///
/// The repository is addressed by the `owner` and `name` in the body;
/// the path id is informational.
async fn update_repository(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateRepositoryRequest>,
) -> Result<Json<DataResponse<Repository>>, AppError> {
    let token = state.provider_token(&session).await?;
    let update = req.update();

    tracing::debug!(%id, owner = %req.owner, repo = %req.name, "Updating repository");
    let repository = state
        .repositories
        .update(&token, &req.repository(), &update)
        .await;
    let repository = state.forget_rejected_token(&token, repository).await?;

    Ok(Json(DataResponse::with_message(
        repository,
        "Repository updated successfully",
    )))
}

/// DELETE /api/repositories/:id
/// Delete a repository
async fn delete_repository(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<DeleteRepositoryRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let token = state.provider_token(&session).await?;

    tracing::debug!(%id, owner = %req.owner, repo = %req.name, "Deleting repository");
    let repository = RepositoryRef {
        owner: req.owner,
        name: req.name,
    };
    let deleted = state.repositories.delete(&token, &repository).await;
    state.forget_rejected_token(&token, deleted).await?;

    Ok(Json(MessageResponse {
        message: "Repository deleted successfully".to_string(),
    }))
}

/// POST /api/repositories/bulk-update
/// Apply one update to many repositories
async fn bulk_update(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    AppJson(req): AppJson<BulkUpdateRequest>,
) -> Result<Json<DataResponse<BulkUpdateSummary>>, AppError> {
    let token = state.provider_token(&session).await?;

    let summary = state
        .repositories
        .bulk_update(&token, req.repositories, req.updates)
        .await?;

    let message = bulk_update_message(&summary);
    Ok(Json(DataResponse::with_message(summary, message)))
}

/// POST /api/repositories/bulk-delete
/// Delete many repositories
async fn bulk_delete(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    AppJson(req): AppJson<BulkDeleteRequest>,
) -> Result<Json<DataResponse<BulkDeleteSummary>>, AppError> {
    let token = state.provider_token(&session).await?;

    let summary = state
        .repositories
        .bulk_delete(&token, req.repositories)
        .await?;

    let message = bulk_delete_message(&summary);
    Ok(Json(DataResponse::with_message(summary, message)))
}
