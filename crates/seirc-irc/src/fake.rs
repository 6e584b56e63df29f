//! In-memory chat backend for tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use seirc_core::{
    ChatEvent, ChatRoom, ChatService, ChatSession, ChatUser, Error, EventSink, FeedItem, IrcConfig,
    MessageEvent, MessageHandle, MessageId, PresenceEvent, Result, TextTranslator, UserId,
};
use tokio::sync::mpsc;
use url::Url;

use crate::dispatch::dispatch;
use crate::session::Session;
use crate::state::SessionState;

/// User id the fake logs every session in as
pub const ME_ID: UserId = 1;

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, (String, Vec<String>)>,
    denied: HashSet<String>,
    reject_logins: bool,
    fail_sends: bool,
    logins: Vec<String>,
    joined: Vec<String>,
    left: Vec<String>,
    sent: Vec<(String, String, MessageId)>,
    edits: Vec<(MessageId, String)>,
    sinks: HashMap<String, EventSink>,
    logouts: usize,
    next_message_id: MessageId,
}

/// Records every call; cheap to clone, clones share state
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.lock().next_message_id = 100;
        backend
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn with_room(self, id: &str, name: &str, members: &[&str]) -> Self {
        let members = members.iter().map(|m| m.to_string()).collect();
        self.lock().rooms.insert(id.to_string(), (name.to_string(), members));
        self
    }

    pub fn deny_join(self, id: &str) -> Self {
        self.lock().denied.insert(id.to_string());
        self
    }

    pub fn reject_logins(self) -> Self {
        self.lock().reject_logins = true;
        self
    }

    pub fn fail_sends(&self) {
        self.lock().fail_sends = true;
    }

    pub fn logins(&self) -> Vec<String> {
        self.lock().logins.clone()
    }

    pub fn joined(&self) -> Vec<String> {
        self.lock().joined.clone()
    }

    pub fn left(&self) -> Vec<String> {
        self.lock().left.clone()
    }

    /// `(room id, text)` of every message sent
    pub fn sent(&self) -> Vec<(String, String)> {
        self.lock().sent.iter().map(|(room, text, _)| (room.clone(), text.clone())).collect()
    }

    pub fn sent_ids(&self) -> Vec<MessageId> {
        self.lock().sent.iter().map(|(_, _, id)| *id).collect()
    }

    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.lock().edits.clone()
    }

    pub fn logouts(&self) -> usize {
        self.lock().logouts
    }

    pub fn is_subscribed(&self, room_id: &str) -> bool {
        self.lock().sinks.contains_key(room_id)
    }

    /// Deliver an item to the subscriber of `room_id`
    pub fn push(&self, room_id: &str, item: FeedItem) {
        if let Some(sink) = self.lock().sinks.get(room_id) {
            let _ = sink.send(item);
        }
    }
}

#[async_trait]
impl ChatService for FakeBackend {
    async fn login(&self, username: &str, _password: &str) -> Result<Arc<dyn ChatSession>> {
        let mut inner = self.lock();
        inner.logins.push(username.to_string());
        if inner.reject_logins {
            return Err(Error::Login("bad credentials".to_string()));
        }
        Ok(Arc::new(FakeSession {
            backend: self.clone(),
            rooms: Mutex::new(HashMap::new()),
        }))
    }
}

struct FakeSession {
    backend: FakeBackend,
    rooms: Mutex<HashMap<String, Arc<dyn ChatRoom>>>,
}

#[async_trait]
impl ChatSession for FakeSession {
    fn me(&self) -> ChatUser {
        ChatUser::new(ME_ID, "bob")
    }

    async fn get_room(&self, room_id: &str) -> Result<Arc<dyn ChatRoom>> {
        if let Some(room) = self.room(room_id) {
            return Ok(room);
        }
        let (name, _) = self
            .backend
            .lock()
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;

        let room: Arc<dyn ChatRoom> = Arc::new(FakeRoom {
            id: room_id.to_string(),
            name,
            backend: self.backend.clone(),
        });
        self.rooms.lock().unwrap().insert(room_id.to_string(), room.clone());
        Ok(room)
    }

    fn room(&self, room_id: &str) -> Option<Arc<dyn ChatRoom>> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }

    async fn logout(&self) -> Result<()> {
        let mut inner = self.backend.lock();
        inner.logouts += 1;
        inner.sinks.clear();
        Ok(())
    }
}

struct FakeRoom {
    id: String,
    name: String,
    backend: FakeBackend,
}

#[async_trait]
impl ChatRoom for FakeRoom {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn join(&self) -> Result<()> {
        let mut inner = self.backend.lock();
        if inner.denied.contains(&self.id) {
            return Err(Error::AccessDenied(self.id.clone()));
        }
        inner.joined.push(self.id.clone());
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let mut inner = self.backend.lock();
        inner.sinks.remove(&self.id);
        inner.left.push(self.id.clone());
        Ok(())
    }

    async fn current_member_names(&self) -> Result<Vec<String>> {
        let inner = self.backend.lock();
        Ok(inner.rooms.get(&self.id).map(|(_, m)| m.clone()).unwrap_or_default())
    }

    async fn pingable_member_names(&self) -> Result<Vec<String>> {
        self.current_member_names().await
    }

    async fn send_message(&self, text: &str) -> Result<MessageHandle> {
        let mut inner = self.backend.lock();
        if inner.fail_sends {
            return Err(Error::Backend("send rejected".to_string()));
        }
        inner.next_message_id += 1;
        let id = inner.next_message_id;
        inner.sent.push((self.id.clone(), text.to_string(), id));
        Ok(MessageHandle {
            id,
            room_id: self.id.clone(),
            content: text.to_string(),
        })
    }

    async fn edit_message(&self, message_id: MessageId, text: &str) -> Result<()> {
        self.backend.lock().edits.push((message_id, text.to_string()));
        Ok(())
    }

    fn subscribe(&self, sink: EventSink) {
        self.backend.lock().sinks.insert(self.id.clone(), sink);
    }
}

/// Fresh unregistered session over `backend`
pub fn new_state(backend: &FakeBackend) -> (Session, SessionState, mpsc::UnboundedReceiver<FeedItem>) {
    let (sink, feed) = mpsc::unbounded_channel();
    let translator = TextTranslator::new(Url::parse("https://chat.stackexchange.com").unwrap());
    let state = SessionState::new(IrcConfig::default(), translator, sink);
    let session = Session::new(Arc::new(backend.clone()));
    (session, state, feed)
}

/// Session registered as `bob`, outbox already drained
pub async fn active_session(
    backend: &FakeBackend,
) -> (Session, SessionState, mpsc::UnboundedReceiver<FeedItem>) {
    let (mut session, mut state, feed) = new_state(backend);
    for line in ["NICK bob", "USER x x x :bob@example.com", "PASS hunter2"] {
        dispatch(&mut session, &mut state, line).await;
    }
    assert!(session.is_active());
    drain(&mut state);
    (session, state, feed)
}

/// Queued lines as wire text
pub fn drain(state: &mut SessionState) -> Vec<String> {
    state.take_outbox().iter().map(|line| line.to_string()).collect()
}

/// A message event in room "1"
pub fn message(
    kind: fn(MessageEvent) -> ChatEvent,
    message_id: MessageId,
    user_id: UserId,
    user_name: &str,
    content: &str,
) -> FeedItem {
    FeedItem::Event(kind(MessageEvent {
        message_id,
        room_id: "1".to_string(),
        room_name: "Lobby".to_string(),
        user: ChatUser::new(user_id, user_name),
        content: content.to_string(),
        parent_id: None,
        show_parent: false,
        time: Utc::now(),
    }))
}

/// A presence event in room "1"
pub fn presence(kind: fn(PresenceEvent) -> ChatEvent, user_id: UserId, user_name: &str) -> FeedItem {
    FeedItem::Event(kind(PresenceEvent {
        room_id: "1".to_string(),
        room_name: "Lobby".to_string(),
        user: ChatUser::new(user_id, user_name),
        time: Utc::now(),
    }))
}
