use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error("Remote error: {0}")]
    Remote(#[from] tally_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No description provided")]
    EmptyDescription,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("Savings goal not found for name/prefix: {0}")]
    GoalNotFound(String),
    #[error("{0}")]
    AmbiguousGoal(String),
    #[error(
        "Sync is not configured. Set TALLY_REMOTE_URL and TALLY_REMOTE_API_KEY to enable `tally sync`."
    )]
    SyncNotConfigured,
    #[error("Not signed in. Set TALLY_ACCESS_TOKEN and TALLY_USER_ID to sync.")]
    NotSignedIn,
}
