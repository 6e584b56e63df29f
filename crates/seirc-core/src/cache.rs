//! Bounded cache of recently seen chat messages
//!
//! Backs edit diffs and reply context. Order is by write: inserting or
//! updating an id makes it the newest entry, reads never reorder.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::chat::{ChatUser, MessageEvent, MessageId, RoomId};

/// Last known state of a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    pub room_id: RoomId,
    pub user: ChatUser,
    /// Raw HTML content
    pub content: String,
    /// Write sequence number, increasing across the cache's lifetime
    pub seq: u64,
}

/// Fixed-capacity map from message id to its latest cached version
pub struct RecentMessages {
    entries: LruCache<MessageId, CachedMessage>,
    next_seq: u64,
}

impl RecentMessages {
    /// Default capacity
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create a cache holding at most `capacity` messages (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            next_seq: 0,
        }
    }

    /// Record a message event, replacing any previous version
    pub fn record(&mut self, event: &MessageEvent) {
        self.insert(
            event.message_id,
            event.parent_id,
            event.room_id.clone(),
            event.user.clone(),
            event.content.clone(),
        );
    }

    /// Insert or replace a message, making it the most recent entry
    pub fn insert(
        &mut self,
        id: MessageId,
        parent_id: Option<MessageId>,
        room_id: RoomId,
        user: ChatUser,
        content: String,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = CachedMessage {
            id,
            parent_id,
            room_id,
            user,
            content,
            seq,
        };

        if let Some((evicted, _)) = self.entries.push(id, entry) {
            if evicted != id {
                debug!("Evicted message {} from recent cache", evicted);
            }
        }
    }

    /// Look up a message without changing eviction order
    pub fn get(&self, id: MessageId) -> Option<&CachedMessage> {
        self.entries.peek(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.entries.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for RecentMessages {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
