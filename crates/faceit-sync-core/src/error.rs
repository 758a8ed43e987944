//! Error types for the Faceit sync system
//!
//! One enum covers configuration, upstream, store and skip conditions. The
//! skip conditions (`UnknownTier`, `NotGameLinked`, `UserAbsent`, ...) are
//! expected outcomes: commands turn them into replies and the scheduler
//! turns them into silent skips.

use thiserror::Error;

/// Result type alias for Faceit sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Faceit sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream rating service errors (transient)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Profile not found upstream
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Skill tier has no entry in the tier table
    #[error("Unknown tier: {0}")]
    UnknownTier(i64),

    /// Profile has no stats for the tracked game
    #[error("Profile {profile_id} has no data for game '{game}'")]
    NotGameLinked {
        /// Profile id
        profile_id: String,
        /// Tracked game key
        game: String,
    },

    /// Local user could not be resolved by the host directory
    #[error("User not present: {0}")]
    UserAbsent(String),

    /// Profile already has a link
    #[error("Profile {0} is already linked")]
    AlreadyLinked(String),

    /// Local user already has a link to another profile
    #[error("User {local_user_id} is already linked to profile {profile_id}")]
    UserAlreadyLinked {
        /// Local user id
        local_user_id: String,
        /// Profile the user is linked to
        profile_id: String,
    },

    /// Local user has no link
    #[error("User {0} is not linked")]
    NotLinked(String),

    /// Invoker lacks a permitted group
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Link store errors
    #[error("Link store error: {0}")]
    LinkStore(String),

    /// Host user directory errors
    #[error("User directory error: {0}")]
    Directory(String),

    /// Per-user work exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a "profile not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a link store error
    pub fn link_store(msg: impl Into<String>) -> Self {
        Self::LinkStore(msg.into())
    }

    /// Create a user directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Whether this error is an expected skip condition rather than a failure
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::UnknownTier(_)
                | Self::NotGameLinked { .. }
                | Self::UserAbsent(_)
                | Self::AlreadyLinked(_)
                | Self::UserAlreadyLinked { .. }
                | Self::NotLinked(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
