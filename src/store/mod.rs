//! In-process state
//!
//! Volatile, cleared on restart.

mod tokens;

pub use tokens::{ProviderToken, TokenStore};
