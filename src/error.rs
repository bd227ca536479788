use std::path::PathBuf;
use thiserror::Error;

/// Broad failure classes surfaced to callers of the club operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

#[derive(Error, Debug)]
pub enum ClubError {
    #[error("group '{0}' already exists")]
    DuplicateGroup(String),

    #[error("restaurant '{restaurant}' already exists in group '{group}'")]
    DuplicateRestaurant { group: String, restaurant: String },

    #[error(
        "review has {votes} votes and {comments} category comments, expected {expected} of each"
    )]
    InvalidReviewShape {
        expected: usize,
        votes: usize,
        comments: usize,
    },

    #[error("vote {value} for category #{index} is outside 0..=10")]
    VoteOutOfRange { index: usize, value: u8 },

    #[error("coordinates ({lat}, {lon}) must be finite numbers")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("'{0}' cannot vote for their own comment")]
    SelfVote(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("restaurant '{restaurant}' not found in group '{group}'")]
    RestaurantNotFound { group: String, restaurant: String },

    #[error("no review by '{reviewer}' for restaurant '{restaurant}'")]
    ReviewNotFound { restaurant: String, reviewer: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ClubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClubError::DuplicateGroup(_)
            | ClubError::DuplicateRestaurant { .. }
            | ClubError::InvalidReviewShape { .. }
            | ClubError::VoteOutOfRange { .. }
            | ClubError::InvalidCoordinates { .. }
            | ClubError::SelfVote(_) => ErrorKind::Validation,
            ClubError::GroupNotFound(_)
            | ClubError::RestaurantNotFound { .. }
            | ClubError::ReviewNotFound { .. } => ErrorKind::NotFound,
            ClubError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            ClubError::DuplicateGroup(_) | ClubError::DuplicateRestaurant { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("snapshot I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("restaurant '{restaurant}' in group '{group}' is inconsistent: {reason}")]
    Schema {
        group: String,
        restaurant: String,
        reason: String,
    },

    #[error("snapshot {} is already held by another writer", .0.display())]
    Locked(PathBuf),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PersistenceError::Io { path, source }
    }
}

#[derive(Error, Debug)]
pub enum RemoteSyncError {
    #[error("backup request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backup server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backup server sent an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("{0} is set but no backup token was supplied")]
    MissingSecret(String),
}
