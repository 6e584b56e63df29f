//! Chat trait implementations over [`StackApi`]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use seirc_core::{
    ChatConfig, ChatRoom, ChatService, ChatSession, ChatUser, EventSink, MessageHandle, MessageId, Result,
};
use tracing::{debug, info};
use url::Url;

use crate::api::StackApi;
use crate::watcher::RoomWatcher;

/// Entry point: one [`StackSession`] per successful login
pub struct StackChatService {
    chat_origin: Url,
    login_origin: Url,
    poll_interval: Duration,
}

impl StackChatService {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self {
            chat_origin: config.origin_url()?,
            login_origin: Url::parse(&config.login_origin)?,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }
}

#[async_trait]
impl ChatService for StackChatService {
    async fn login(&self, username: &str, password: &str) -> Result<Arc<dyn ChatSession>> {
        let api = StackApi::new(self.chat_origin.clone(), self.login_origin.clone())?;
        let me = api.login(username, password).await?;

        Ok(Arc::new(StackSession {
            api: Arc::new(api),
            me,
            rooms: DashMap::new(),
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct StackSession {
    api: Arc<StackApi>,
    me: ChatUser,
    rooms: DashMap<String, Arc<StackRoom>>,
    poll_interval: Duration,
}

#[async_trait]
impl ChatSession for StackSession {
    fn me(&self) -> ChatUser {
        self.me.clone()
    }

    async fn get_room(&self, room_id: &str) -> Result<Arc<dyn ChatRoom>> {
        if let Some(room) = self.room(room_id) {
            return Ok(room);
        }

        let info = self.api.room_info(room_id).await?;
        let room = Arc::new(StackRoom {
            api: Arc::clone(&self.api),
            id: info.id.to_string(),
            name: info.name,
            cursor: AtomicU64::new(0),
            watcher: Mutex::new(None),
            poll_interval: self.poll_interval,
        });
        debug!(room_id = %room.id, name = %room.name, "Resolved room");

        let room = self.rooms.entry(room.id.clone()).or_insert(room).value().clone();
        Ok(room)
    }

    fn room(&self, room_id: &str) -> Option<Arc<dyn ChatRoom>> {
        self.rooms
            .get(room_id)
            .map(|room| Arc::clone(room.value()) as Arc<dyn ChatRoom>)
    }

    async fn logout(&self) -> Result<()> {
        for room in self.rooms.iter() {
            room.stop_watcher();
        }
        self.rooms.clear();
        self.api.logout().await?;
        Ok(())
    }
}

pub struct StackRoom {
    api: Arc<StackApi>,
    id: String,
    name: String,
    cursor: AtomicU64,
    watcher: Mutex<Option<Arc<AtomicBool>>>,
    poll_interval: Duration,
}

impl StackRoom {
    fn stop_watcher(&self) {
        let running = match self.watcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(running) = running {
            running.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ChatRoom for StackRoom {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn join(&self) -> Result<()> {
        let cursor = self.api.join_room(&self.id).await?;
        self.cursor.store(cursor, Ordering::SeqCst);
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        self.stop_watcher();
        self.api.leave_room(&self.id).await?;
        Ok(())
    }

    async fn current_member_names(&self) -> Result<Vec<String>> {
        Ok(self.api.pingable(&self.id).await?)
    }

    async fn pingable_member_names(&self) -> Result<Vec<String>> {
        Ok(self.api.pingable(&self.id).await?)
    }

    async fn send_message(&self, text: &str) -> Result<MessageHandle> {
        let id = self.api.send_message(&self.id, text).await?;
        Ok(MessageHandle {
            id,
            room_id: self.id.clone(),
            content: text.to_string(),
        })
    }

    async fn edit_message(&self, message_id: MessageId, text: &str) -> Result<()> {
        Ok(self.api.edit_message(message_id, text).await?)
    }

    fn subscribe(&self, sink: EventSink) {
        self.stop_watcher();

        let watcher = RoomWatcher::new(
            Arc::clone(&self.api),
            &self.id,
            self.cursor.load(Ordering::SeqCst),
            sink,
            self.poll_interval,
        );
        match self.watcher.lock() {
            Ok(mut guard) => *guard = Some(watcher.running()),
            Err(poisoned) => *poisoned.into_inner() = Some(watcher.running()),
        }

        info!(room_id = %self.id, "Subscribed to room events");
        tokio::spawn(watcher.run());
    }
}

impl Drop for StackRoom {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seirc_core::{ChatEvent, FeedItem};
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn logged_in(server: &MockServer) -> Arc<dyn ChatSession> {
        Mock::given(method("GET"))
            .and(path("/users/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<input name="fkey" value="aa11">"#),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chats/join/favorite"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div id="active-user" class="user-container user-1"></div><input name="fkey" value="bb22">"#,
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/thumbs/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "name": "bob"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rooms/thumbs/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "name": "Sandbox"})))
            .mount(server)
            .await;

        let config = ChatConfig {
            origin: server.uri(),
            login_origin: server.uri(),
            poll_interval_secs: 1,
        };
        let service = StackChatService::new(&config).unwrap();
        service.login("bob@example.com", "pw").await.unwrap()
    }

    #[tokio::test]
    async fn test_login_and_room_cache() {
        let server = MockServer::start().await;
        let session = logged_in(&server).await;

        assert_eq!(session.me(), ChatUser::new(1, "bob"));
        assert!(session.room("1").is_none());

        let room = session.get_room("1").await.unwrap();
        assert_eq!(room.name(), "Sandbox");
        assert!(session.room("1").is_some());

        let err = session.get_room("2").await.err().unwrap();
        assert!(matches!(err, seirc_core::Error::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_join_subscribe_and_send() {
        let server = MockServer::start().await;
        let session = logged_in(&server).await;
        Mock::given(method("POST"))
            .and(path("/chats/1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"events": [], "time": 50})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(body_string_contains("r1=50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "r1": {"e": [{
                    "event_type": 1, "id": 51, "room_id": 1, "room_name": "Sandbox",
                    "user_id": 7, "user_name": "alice", "message_id": 900, "content": "hi"
                }], "t": 51}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chats/1/messages/new"))
            .and(body_string_contains("fkey=bb22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 901})))
            .mount(&server)
            .await;

        let room = session.get_room("1").await.unwrap();
        room.join().await.unwrap();
        let (sink, mut feed) = mpsc::unbounded_channel();
        room.subscribe(sink);

        let Some(FeedItem::Event(ChatEvent::MessagePosted(msg))) = feed.recv().await else {
            panic!("expected a posted message");
        };
        assert_eq!(msg.message_id, 900);
        assert_eq!(msg.room_id, "1");

        let handle = room.send_message("hello").await.unwrap();
        assert_eq!(handle.id, 901);
        assert_eq!(handle.content, "hello");
    }
}
