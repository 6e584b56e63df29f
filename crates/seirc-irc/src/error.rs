//! Error types for seirc-irc

use thiserror::Error;

/// IRC gateway error type
#[derive(Error, Debug)]
pub enum IrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] seirc_core::Error),
}

/// Result type alias for seirc-irc
pub type Result<T> = std::result::Result<T, IrcError>;
