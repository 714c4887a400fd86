//! SCIM directory API client module
//!
//! Wraps the three directory operations the sync needs: list every user,
//! create one user, delete one user. All requests carry the configured
//! bearer token.

pub mod client;
pub mod error;
pub mod types;

use crate::record::LocalUserRecord;
use async_trait::async_trait;

pub use client::{ScimClient, ScimClientBuilder};
pub use error::{CreateError, DeleteError, DirectoryError, Result};
pub use types::*;

/// Operations the reconciler performs against the directory
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Fetch every user in one request
    async fn list_users(&self) -> Result<Vec<RemoteUserRecord>>;

    /// Create a user and return the directory-assigned id
    async fn create_user(
        &self,
        record: &LocalUserRecord,
    ) -> std::result::Result<String, CreateError>;

    /// Delete a user by directory id
    async fn delete_user(&self, id: &str) -> std::result::Result<(), DeleteError>;
}
