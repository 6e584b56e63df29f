//! Error types for seirc-core

use thiserror::Error;

/// Main error type shared by the gateway crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Login failed: {0}")]
    Login(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Access denied to room {0}")]
    AccessDenied(String),

    #[error("Connection to backend lost: {0}")]
    Disconnected(String),

    #[error("Chat backend error: {0}")]
    Backend(String),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for seirc-core
pub type Result<T> = std::result::Result<T, Error>;
