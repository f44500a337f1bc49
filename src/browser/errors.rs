//! Session error types

use thiserror::Error;

/// Errors raised while driving one search session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No usable profile: {0}")]
    ProfileUnavailable(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript error: {0}")]
    JavaScriptError(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Challenge page detected: {0}")]
    ChallengeDetected(String),

    #[error("Target URL not found in results: {0}")]
    TargetNotFound(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}
