use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("{0}")]
    Validation(String),

    #[error("update rejected: {0}")]
    Rejected(String),

    #[error("a commit is already in progress")]
    CommitInProgress,

    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    #[error("invalid priority '{0}'")]
    InvalidPriority(String),

    #[error("invalid sort field '{0}', expected one of: priority, created, updated, id")]
    InvalidSortField(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeskError>;

/// Coarse classification used by callers to decide how to surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    Network,
    Parse,
    Validation,
    Rejected,
    Busy,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Busy => "busy",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl DeskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeskError::Auth(_) => ErrorKind::Auth,
            DeskError::Network(_) => ErrorKind::Network,
            DeskError::Parse(_) | DeskError::Json(_) => ErrorKind::Parse,
            DeskError::Validation(_)
            | DeskError::InvalidStatus(_)
            | DeskError::InvalidPriority(_)
            | DeskError::InvalidSortField(_) => ErrorKind::Validation,
            DeskError::Rejected(_) => ErrorKind::Rejected,
            DeskError::CommitInProgress => ErrorKind::Busy,
            DeskError::Config(_) | DeskError::Io(_) | DeskError::YamlParse(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Whether repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Parse | ErrorKind::Rejected | ErrorKind::Busy
        )
    }

    /// Message suitable for showing to the end user.
    ///
    /// Parse failures read like network failures here; the distinct kind is
    /// only for diagnostics.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Auth => "Your session has expired. Please log in again.".to_string(),
            ErrorKind::Network | ErrorKind::Parse => {
                "Could not reach the ticket service. Please try again.".to_string()
            }
            ErrorKind::Busy => "Changes are still being saved. Please wait.".to_string(),
            ErrorKind::Validation | ErrorKind::Rejected | ErrorKind::Config => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeskError::Parse(err.to_string())
        } else {
            DeskError::Network(err.to_string())
        }
    }
}
