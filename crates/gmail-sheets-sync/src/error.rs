//! Error types for a sync run.
//!
//! Each operation returns a `SyncResult`; the caller decides whether a
//! failure is logged and skipped (a single message), truncates the run
//! (a batch sheet call) or aborts it (configuration and authentication).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth client secret file is missing
    #[error(
        "Credentials file not found at {}. Please download credentials.json from Google Cloud Console",
        .0.display()
    )]
    MissingCredentials(PathBuf),

    /// Authenticator construction or token acquisition failed
    #[error("Authentication failed: {0}")]
    Auth(#[source] anyhow::Error),

    /// Gmail API request failed
    #[error("Gmail request failed: {0}")]
    Mailbox(#[source] anyhow::Error),

    /// The configured sheet tab does not exist
    #[error("Sheet '{0}' not found. Please create it first")]
    SheetNotFound(String),

    /// Sheets API request failed
    #[error("Sheets request failed: {0}")]
    Sheets(#[source] anyhow::Error),

    /// State file could not be written
    #[error("Failed to persist state to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State could not be serialized or deserialized
    #[error("Invalid state data: {0}")]
    StateFormat(#[from] serde_json::Error),

    /// A single message could not be turned into a record
    #[error("Failed to parse message {id}: {reason}")]
    Parse { id: String, reason: String },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Config(message.into())
    }

    pub fn parse(id: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Parse {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the run before any state is touched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::MissingCredentials(_) | SyncError::Auth(_)
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
