//! Error types for seirc-stack

use thiserror::Error;

/// Stack Exchange chat error type
#[derive(Error, Debug)]
pub enum StackError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chat API error: {0}")]
    Api(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("{0}")]
    Login(String),

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Access denied to room {0}")]
    AccessDenied(String),

    #[error("Rate limited, retry in {0}s")]
    RateLimited(u64),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<StackError> for seirc_core::Error {
    fn from(err: StackError) -> Self {
        match err {
            StackError::Login(msg) => seirc_core::Error::Login(msg),
            StackError::RoomNotFound(id) => seirc_core::Error::RoomNotFound(id),
            StackError::AccessDenied(id) => seirc_core::Error::AccessDenied(id),
            other => seirc_core::Error::Backend(other.to_string()),
        }
    }
}

/// Result type alias for seirc-stack
pub type Result<T> = std::result::Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_core_error() {
        let core: seirc_core::Error = StackError::RoomNotFound("5".to_string()).into();
        assert!(matches!(core, seirc_core::Error::RoomNotFound(id) if id == "5"));

        let core: seirc_core::Error = StackError::Api("500 - boom".to_string()).into();
        assert_eq!(core.to_string(), "Chat backend error: Chat API error: 500 - boom");
    }
}
