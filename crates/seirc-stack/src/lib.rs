//! seirc-stack: Stack Exchange chat backend
//!
//! Implements the `seirc-core` chat traits over the chat site's web
//! endpoints: cookie-based login, room lookup, posting and editing, and a
//! polling watcher per subscribed room.

pub mod api;
pub mod client;
pub mod error;
pub mod types;
pub mod watcher;

pub use api::StackApi;
pub use client::{StackChatService, StackRoom, StackSession};
pub use error::{Result, StackError};
pub use watcher::RoomWatcher;
