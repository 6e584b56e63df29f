//! Wire types for the chat site's JSON endpoints

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use seirc_core::{ChatEvent, ChatUser, MessageEvent, PresenceEvent};
use serde::Deserialize;

/// Numeric event types the gateway understands
pub mod event_type {
    pub const MESSAGE_POSTED: u32 = 1;
    pub const MESSAGE_EDITED: u32 = 2;
    pub const USER_ENTERED: u32 = 3;
    pub const USER_LEFT: u32 = 4;
    pub const USER_MENTIONED: u32 = 8;
    pub const MESSAGE_REPLY: u32 = 18;
}

/// One event as delivered by `/events` or `/chats/<id>/events`
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub event_type: u32,
    #[serde(default)]
    pub time_stamp: i64,
    #[serde(default)]
    pub id: u64,
    pub room_id: u64,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub show_parent: Option<bool>,
    #[serde(default)]
    pub target_user_id: Option<u64>,
}

impl RawEvent {
    /// Typed form of this event, or `None` if it lacks a field its type needs
    pub fn into_chat_event(self) -> Option<ChatEvent> {
        let room_id = self.room_id.to_string();
        let time = DateTime::from_timestamp(self.time_stamp, 0).unwrap_or_else(Utc::now);

        match self.event_type {
            event_type::MESSAGE_POSTED => self.message(time).map(ChatEvent::MessagePosted),
            event_type::MESSAGE_EDITED => self.message(time).map(ChatEvent::MessageEdited),
            event_type::USER_MENTIONED => self.message(time).map(ChatEvent::UserMentioned),
            event_type::MESSAGE_REPLY => self.message(time).map(ChatEvent::MessageReply),
            event_type::USER_ENTERED => self.presence(time).map(ChatEvent::UserEntered),
            event_type::USER_LEFT => self.presence(time).map(ChatEvent::UserLeft),
            other => Some(ChatEvent::Other {
                room_id,
                event_type: other,
            }),
        }
    }

    fn user(&self) -> Option<ChatUser> {
        Some(ChatUser::new(self.user_id?, self.user_name.clone()?))
    }

    fn message(self, time: DateTime<Utc>) -> Option<MessageEvent> {
        Some(MessageEvent {
            message_id: self.message_id?,
            user: self.user()?,
            room_id: self.room_id.to_string(),
            room_name: self.room_name.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            parent_id: self.parent_id,
            show_parent: self.show_parent.unwrap_or(false),
            time,
        })
    }

    fn presence(self, time: DateTime<Utc>) -> Option<PresenceEvent> {
        Some(PresenceEvent {
            user: self.user()?,
            room_id: self.room_id.to_string(),
            room_name: self.room_name.unwrap_or_default(),
            time,
        })
    }
}

/// Response of `POST /chats/<id>/events`
#[derive(Debug, Deserialize)]
pub struct RoomEventsResponse {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    pub time: u64,
}

/// Per-room section of a `POST /events` response
#[derive(Debug, Default, Deserialize)]
pub struct PollSection {
    #[serde(default)]
    pub e: Vec<RawEvent>,
    #[serde(default)]
    pub t: Option<u64>,
}

/// `POST /events` response, keyed `r<room id>`
pub type PollResponse = HashMap<String, PollSection>;

/// Response of `POST /chats/<id>/messages/new`
#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub id: u64,
    #[serde(default)]
    pub time: Option<i64>,
}

/// `GET /rooms/thumbs/<id>`
#[derive(Debug, Deserialize)]
pub struct RoomThumb {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /users/thumbs/<id>`
#[derive(Debug, Deserialize)]
pub struct UserThumb {
    pub id: u64,
    pub name: String,
}

/// Names from a `GET /rooms/pingable/<id>` body: `[[id, "name", ...], ...]`
pub fn pingable_names(body: &[serde_json::Value]) -> Vec<String> {
    body.iter()
        .filter_map(|entry| entry.get(1)?.as_str().map(str::to_string))
        .collect()
}
