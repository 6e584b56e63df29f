//! Channel registry
//!
//! Two-way map between joined chat rooms and their IRC channel names. Only
//! ids and names live here; room objects stay with the chat session.

use std::collections::HashMap;

use seirc_core::{RoomId, to_channel};

/// A joined room and the channel it is shown as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub room_name: String,
    pub channel: String,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    by_room: HashMap<RoomId, Binding>,
    by_channel: HashMap<String, RoomId>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_room(&self, room_id: &str) -> Option<&Binding> {
        self.by_room.get(room_id)
    }

    /// Look up by channel name, case-insensitively
    pub fn by_channel(&self, channel: &str) -> Option<&Binding> {
        let room_id = self.by_channel.get(&channel.to_lowercase())?;
        self.by_room.get(room_id)
    }

    /// Look up by channel name or room id
    pub fn resolve(&self, key: &str) -> Option<&Binding> {
        if key.starts_with('#') {
            self.by_channel(key)
        } else {
            self.by_room(key)
        }
    }

    /// Bind a room, returning the existing binding if it is already joined
    pub fn bind(&mut self, room_id: &str, room_name: &str) -> &Binding {
        if !self.by_room.contains_key(room_id) {
            let channel = self.free_channel_name(room_id, room_name);
            self.by_channel.insert(channel.clone(), room_id.to_string());
            self.by_room.insert(
                room_id.to_string(),
                Binding {
                    room_id: room_id.to_string(),
                    room_name: room_name.to_string(),
                    channel,
                },
            );
        }

        &self.by_room[room_id]
    }

    /// Remove a binding by channel name or room id
    pub fn unbind(&mut self, key: &str) -> Option<Binding> {
        let room_id = self.resolve(key)?.room_id.clone();
        let binding = self.by_room.remove(&room_id)?;
        self.by_channel.remove(&binding.channel);
        Some(binding)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.by_room.values()
    }

    pub fn len(&self) -> usize {
        self.by_room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_room.is_empty()
    }

    /// Derived channel name, suffixed with the room id if another room has it
    fn free_channel_name(&self, room_id: &str, room_name: &str) -> String {
        let channel = to_channel(room_name);
        if self.by_channel.contains_key(&channel) {
            format!("{}-{}", channel, room_id)
        } else {
            channel
        }
    }
}
