//! API layer
//!
//! HTTP handlers for:
//! - Current user profile
//! - Repository listing, updates and deletion (single and bulk)
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod repositories;
mod user;

pub use dto::*;

pub use metrics::metrics_router;
pub use repositories::repositories_router;
pub use user::user_router;

use axum::{Router, middleware};

use crate::AppState;
use crate::auth::{auth_router, require_auth};

/// Create the `/api` router
///
/// The OAuth endpoints are public; everything else requires a session.
pub fn api_router(state: AppState) -> Router<AppState> {
    let public_routes = auth_router();

    let authenticated_routes = Router::new()
        .merge(user_router())
        .merge(repositories_router())
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
}
