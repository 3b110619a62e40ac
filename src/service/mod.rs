//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate GitHub calls made on behalf of a user.

mod repository;

pub use repository::{
    BulkDeleteSummary, BulkItemResult, BulkUpdateSummary, RepositoryListing, RepositoryRef,
    RepositoryService,
};
