//! Current user endpoint

use axum::{Router, extract::State, response::Json, routing::get};

use super::dto::DataResponse;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

pub fn user_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

/// GET /api/auth/me
/// GitHub profile of the signed-in user, as GitHub returns it
async fn me(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    let token = state.provider_token(&session).await?;
    let profile = state.github.fetch_user_profile(&token.access_token).await;
    let profile = state.forget_rejected_token(&token, profile).await?;

    Ok(Json(DataResponse::new(profile)))
}
