//! Per-connection state shared by the session and the event router

use std::collections::HashMap;
use std::sync::Arc;

use seirc_core::{ChatSession, EventSink, IrcConfig, MessageHandle, RecentMessages, TextTranslator};
use tracing::{debug, warn};

use crate::message::Line;
use crate::registry::ChannelRegistry;

pub struct SessionState {
    pub(crate) config: IrcConfig,
    pub(crate) translator: TextTranslator,
    pub(crate) nick: Option<String>,
    pub(crate) chat: Option<Arc<dyn ChatSession>>,
    pub(crate) channels: ChannelRegistry,
    pub(crate) recent: RecentMessages,
    /// Last message this session posted, per channel
    pub(crate) pending_outbound: HashMap<String, MessageHandle>,
    sink: EventSink,
    outbox: Vec<Line>,
}

impl SessionState {
    pub fn new(config: IrcConfig, translator: TextTranslator, sink: EventSink) -> Self {
        let recent = RecentMessages::new(config.cache_capacity);
        Self {
            config,
            translator,
            nick: None,
            chat: None,
            channels: ChannelRegistry::new(),
            recent,
            pending_outbound: HashMap::new(),
            sink,
            outbox: Vec::new(),
        }
    }

    /// Current nick, or `*` before one is set
    pub fn nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    pub fn server_name(&self) -> &str {
        &self.config.server_name
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn chat(&self) -> Option<&Arc<dyn ChatSession>> {
        self.chat.as_ref()
    }

    pub fn last_sent(&self, channel: &str) -> Option<&MessageHandle> {
        self.pending_outbound.get(channel)
    }

    /// Feed sender to hand to room subscriptions
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Queue a line for the client
    pub fn emit(&mut self, line: Line) {
        self.outbox.push(line);
    }

    /// `:<server> <code> <nick>`, ready for more params
    pub fn numeric(&self, code: &str) -> Line {
        Line::new(code).with_prefix(self.server_name()).param(self.nick())
    }

    /// Queue a server NOTICE to the client
    pub fn notice(&mut self, text: &str) {
        let line = Line::new("NOTICE")
            .with_prefix(self.server_name())
            .param(self.nick())
            .trailing(text);
        self.emit(line);
    }

    /// Drain queued lines in emission order
    pub fn take_outbox(&mut self) -> Vec<Line> {
        std::mem::take(&mut self.outbox)
    }

    /// Log out of the chat session, if one is open
    pub async fn teardown(&mut self) {
        self.pending_outbound.clear();
        if let Some(chat) = self.chat.take() {
            debug!("Logging out of chat");
            if let Err(e) = chat.logout().await {
                warn!("Chat logout failed: {}", e);
            }
        }
    }
}
