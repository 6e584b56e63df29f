//! Chat-service collaborator interface
//!
//! The gateway core talks to the chat service only through these traits.
//! A backend crate provides the concrete transport; tests provide fakes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::Result;

/// Opaque room identifier
pub type RoomId = String;

/// Chat message identifier
pub type MessageId = u64;

/// Chat user identifier
pub type UserId = u64;

/// Sender half of a session's event feed
pub type EventSink = mpsc::UnboundedSender<FeedItem>;

/// A chat-service identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub name: String,
}

impl ChatUser {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A message this session posted, kept so it can be edited later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub id: MessageId,
    pub room_id: RoomId,
    /// Plain-text form of the current content
    pub content: String,
}

/// Payload of message-carrying events
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub room_name: String,
    pub user: ChatUser,
    /// Rendered HTML content
    pub content: String,
    pub parent_id: Option<MessageId>,
    /// Whether the service renders this as a reply to `parent_id`
    pub show_parent: bool,
    pub time: DateTime<Utc>,
}

/// Payload of presence events
#[derive(Debug, Clone)]
pub struct PresenceEvent {
    pub room_id: RoomId,
    pub room_name: String,
    pub user: ChatUser,
    pub time: DateTime<Utc>,
}

/// Typed events pushed by a room subscription
#[derive(Debug, Clone)]
pub enum ChatEvent {
    MessagePosted(MessageEvent),
    MessageEdited(MessageEvent),
    UserEntered(PresenceEvent),
    UserLeft(PresenceEvent),
    /// Alert accompanying a `MessagePosted` that mentions this user
    UserMentioned(MessageEvent),
    /// Alert accompanying a `MessagePosted` that replies to this user
    MessageReply(MessageEvent),
    /// Any event type the gateway does not render
    Other { room_id: RoomId, event_type: u32 },
}

impl ChatEvent {
    /// Room this event belongs to
    pub fn room_id(&self) -> &str {
        match self {
            ChatEvent::MessagePosted(m)
            | ChatEvent::MessageEdited(m)
            | ChatEvent::UserMentioned(m)
            | ChatEvent::MessageReply(m) => &m.room_id,
            ChatEvent::UserEntered(p) | ChatEvent::UserLeft(p) => &p.room_id,
            ChatEvent::Other { room_id, .. } => room_id,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::MessagePosted(_) => "message_posted",
            ChatEvent::MessageEdited(_) => "message_edited",
            ChatEvent::UserEntered(_) => "user_entered",
            ChatEvent::UserLeft(_) => "user_left",
            ChatEvent::UserMentioned(_) => "user_mentioned",
            ChatEvent::MessageReply(_) => "message_reply",
            ChatEvent::Other { .. } => "other",
        }
    }
}

/// One item on a session's feed
#[derive(Debug, Clone)]
pub enum FeedItem {
    Event(ChatEvent),
    /// The backend can no longer be reached; the session must end
    Lost(String),
}

/// Entry point of a chat backend
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Authenticate and open a chat session
    async fn login(&self, username: &str, password: &str) -> Result<Arc<dyn ChatSession>>;
}

/// An authenticated chat session
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// The identity this session is logged in as
    fn me(&self) -> ChatUser;

    /// Resolve a room by id, fetching it from the service if needed
    async fn get_room(&self, room_id: &str) -> Result<Arc<dyn ChatRoom>>;

    /// A room previously resolved through `get_room`
    fn room(&self, room_id: &str) -> Option<Arc<dyn ChatRoom>>;

    /// End the session and stop every room subscription
    async fn logout(&self) -> Result<()>;
}

/// A chat room, owned by the backend
#[async_trait]
pub trait ChatRoom: Send + Sync {
    fn id(&self) -> &str;

    /// Human display name
    fn name(&self) -> &str;

    async fn join(&self) -> Result<()>;

    async fn leave(&self) -> Result<()>;

    /// Display names of users currently in the room
    async fn current_member_names(&self) -> Result<Vec<String>>;

    /// Display names of users a mention would reach
    async fn pingable_member_names(&self) -> Result<Vec<String>>;

    async fn send_message(&self, text: &str) -> Result<MessageHandle>;

    async fn edit_message(&self, message_id: MessageId, text: &str) -> Result<()>;

    /// Deliver this room's events to `sink` until left or the sink closes
    fn subscribe(&self, sink: EventSink);
}
