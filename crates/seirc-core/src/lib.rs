//! seirc-core: shared building blocks for the IRC to chat gateway
//!
//! Configuration, the chat-service collaborator traits and event model,
//! text translation between chat HTML and IRC formatting, and the bounded
//! recent-message cache used for edit diffs and reply context.

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod text;

pub use cache::{CachedMessage, RecentMessages};
pub use chat::{
    ChatEvent, ChatRoom, ChatService, ChatSession, ChatUser, EventSink, FeedItem, MessageEvent,
    MessageHandle, MessageId, PresenceEvent, RoomId, UserId,
};
pub use config::{ChatConfig, Config, IrcConfig, ListenConfig};
pub use error::{Error, Result};
pub use text::{TextTranslator, diffstr, irc_to_chat, to_channel, to_nick};
