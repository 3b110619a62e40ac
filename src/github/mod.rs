//! GitHub upstream
//!
//! Handles:
//! - OAuth code exchange
//! - REST calls made with a user's token
//! - Estimating repository totals from pagination headers

mod client;
mod models;
pub mod pagination;

pub use client::{GitHubClient, REPOSITORY_SORTS, validate_repository_segment};
pub use models::{
    AccessToken, GitHubUser, Repository, RepositoryOwner, RepositoryPage, RepositoryUpdate,
};
