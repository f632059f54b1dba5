use crate::core::category::Category;
use http::StatusCode;
use std::error::Error;
use std::fmt;
use tokio_cron_scheduler::JobSchedulerError;

/// Custom Error and Result types to unify errors from all sources.
pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug)]
pub enum BoardError {
    // Client-facing failures of the query surface.
    Validation(String),
    Unauthorized,
    NotFound(Category),
    Render(String),
    // Infrastructure.
    Http(String),
    Scheduler(String),
    Config(String),
    ChannelSend(String),
    Feed(String),
    Io(String),
    Serialization(String),
}

impl BoardError {
    /// Status code the query surface answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BoardError::Validation(_) => StatusCode::BAD_REQUEST,
            BoardError::Unauthorized => StatusCode::UNAUTHORIZED,
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoardError::Validation(s) => write!(f, "Validation Error: {}", s),
            BoardError::Unauthorized => write!(f, "Unauthorized. Invalid API key."),
            BoardError::NotFound(c) => write!(f, "No leaderboard data available for {}", c),
            BoardError::Render(s) => write!(f, "Render Error: {}", s),
            BoardError::Http(s) => write!(f, "HTTP Error: {}", s),
            BoardError::Scheduler(s) => write!(f, "Scheduler Error: {}", s),
            BoardError::Config(s) => write!(f, "Config Error: {}", s),
            BoardError::ChannelSend(s) => write!(f, "Channel Send Error: {}", s),
            BoardError::Feed(s) => write!(f, "World Feed Error: {}", s),
            BoardError::Io(s) => write!(f, "IO Error: {}", s),
            BoardError::Serialization(s) => write!(f, "Serialization Error: {}", s),
        }
    }
}

impl Error for BoardError {}

impl From<reqwest::Error> for BoardError {
    fn from(error: reqwest::Error) -> Self {
        BoardError::Http(error.to_string())
    }
}

impl From<JobSchedulerError> for BoardError {
    fn from(error: JobSchedulerError) -> Self {
        BoardError::Scheduler(error.to_string())
    }
}

impl From<figment::Error> for BoardError {
    fn from(error: figment::Error) -> Self {
        BoardError::Config(error.to_string())
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(error: serde_json::Error) -> Self {
        BoardError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for BoardError {
    fn from(error: std::io::Error) -> Self {
        BoardError::Io(error.to_string())
    }
}

impl From<minijinja::Error> for BoardError {
    fn from(error: minijinja::Error) -> Self {
        BoardError::Render(error.to_string())
    }
}
