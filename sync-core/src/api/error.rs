use crate::record::LocalUserRecord;
use thiserror::Error;

/// Failure talking to the directory
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Incomplete user listing: {returned} of {total} user(s) returned")]
    IncompleteListing { total: u64, returned: usize },
}

impl DirectoryError {
    /// HTTP status behind the error, if the directory answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DirectoryError::Authentication(_) => Some(401),
            DirectoryError::Authorization(_) => Some(403),
            DirectoryError::NotFound(_) => Some(404),
            DirectoryError::Conflict(_) => Some(409),
            DirectoryError::Server { status, .. } => Some(*status),
            DirectoryError::Network(e) => e.status().map(|s| s.as_u16()),
            DirectoryError::Json(_)
            | DirectoryError::InvalidUrl(_)
            | DirectoryError::IncompleteListing { .. } => None,
        }
    }
}

/// Failure creating one user
#[derive(Error, Debug)]
pub enum CreateError {
    #[error("User already exists: {0}")]
    Conflict(LocalUserRecord),

    #[error("Failed to create user {0}: {1}")]
    Other(LocalUserRecord, #[source] DirectoryError),
}

impl CreateError {
    pub fn record(&self) -> &LocalUserRecord {
        match self {
            CreateError::Conflict(record) | CreateError::Other(record, _) => record,
        }
    }
}

/// Failure deleting one user
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("User {0} not found")]
    NotFound(String),

    #[error("Failed to delete user {0}: {1}")]
    Other(String, #[source] DirectoryError),
}

impl DeleteError {
    pub fn id(&self) -> &str {
        match self {
            DeleteError::NotFound(id) | DeleteError::Other(id, _) => id,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
