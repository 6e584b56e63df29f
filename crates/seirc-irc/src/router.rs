//! Chat event routing
//!
//! Turns feed items from room subscriptions into IRC lines for the client.
//! Failures while handling one event become a NOTICE and never end the
//! session; only a lost backend does.

use seirc_core::text::{preview, strip_leading_mention, to_action};
use seirc_core::{
    ChatEvent, ChatUser, Error, FeedItem, MessageEvent, MessageHandle, PresenceEvent, irc_to_chat, to_nick,
};
use tracing::{debug, error, warn};

use crate::message::{Line, MAX_PAYLOAD_LEN, split_payload};
use crate::session::Flow;
use crate::state::SessionState;

#[derive(Debug, Default)]
pub struct EventRouter;

impl EventRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, state: &mut SessionState, item: FeedItem) -> Flow {
        match item {
            FeedItem::Event(event) => {
                debug!(kind = event.kind(), room_id = %event.room_id(), "<<chat");
                if let Err(e) = self.handle(state, event) {
                    warn!("Error processing chat event: {}", e);
                    state.notice(&format!("Error processing message from chat: {}", e));
                }
                Flow::Continue
            }
            FeedItem::Lost(reason) => {
                error!("Chat backend lost: {}", reason);
                let quit = Line::quit(state.nick(), "Connection to backend lost");
                state.emit(quit);
                Flow::Close
            }
        }
    }

    fn handle(&self, state: &mut SessionState, event: ChatEvent) -> seirc_core::Result<()> {
        let me = state.chat.as_ref().map(|chat| chat.me()).ok_or(Error::NotLoggedIn)?;

        match event {
            ChatEvent::MessagePosted(msg) => self.message_posted(state, &me, msg),
            ChatEvent::MessageEdited(msg) => self.message_edited(state, &me, msg),
            ChatEvent::UserEntered(presence) => self.presence(state, &me, presence, Line::join),
            ChatEvent::UserLeft(presence) => self.presence(state, &me, presence, Line::part),
            ChatEvent::UserMentioned(msg) | ChatEvent::MessageReply(msg) => {
                debug!(message_id = msg.message_id, "Alert duplicates a posted message, skipping");
            }
            ChatEvent::Other { event_type, .. } => {
                debug!(event_type, "Ignoring chat event");
            }
        }

        Ok(())
    }

    fn message_posted(&self, state: &mut SessionState, me: &ChatUser, msg: MessageEvent) {
        let Some(channel) = channel_for(state, &msg.room_id) else {
            return;
        };

        if msg.user.id == me.id {
            // The echo of a send can trail a self-edit of the same message
            let known = state
                .pending_outbound
                .get(&channel)
                .is_some_and(|last| last.id >= msg.message_id);
            if !known {
                let handle = MessageHandle {
                    id: msg.message_id,
                    room_id: msg.room_id.clone(),
                    content: chat_text(state, &msg.content),
                };
                state.pending_outbound.insert(channel, handle);
            }
        } else {
            let text = self
                .reply_text(state, &msg)
                .unwrap_or_else(|| state.translator.to_irc(&msg.content));
            self.send_lines(state, &to_nick(&msg.user.name), &channel, &text);
        }

        state.recent.record(&msg);
    }

    /// New message text with a preview of the message it answers
    fn reply_text(&self, state: &SessionState, msg: &MessageEvent) -> Option<String> {
        if !msg.show_parent {
            return None;
        }
        let parent = state.recent.get(msg.parent_id?)?;

        let parent_text = state.translator.to_irc(&parent.content);
        let parent_text = parent_text.split_whitespace().collect::<Vec<_>>().join(" ");
        let context = preview(strip_leading_mention(&parent_text), state.config.reply_preview_len);
        let body = state.translator.to_irc(&msg.content);

        if body.starts_with('@') {
            Some(format!("{} [re: {}]", body, context))
        } else {
            Some(format!("@{} {} [re: {}]", to_nick(&parent.user.name), body, context))
        }
    }

    fn message_edited(&self, state: &mut SessionState, me: &ChatUser, msg: MessageEvent) {
        let Some(channel) = channel_for(state, &msg.room_id) else {
            return;
        };

        if msg.user.id == me.id {
            let content = chat_text(state, &msg.content);
            if let Some(last) = state
                .pending_outbound
                .get_mut(&channel)
                .filter(|last| last.id == msg.message_id)
            {
                last.content = content;
            }
        } else {
            let new_text = state.translator.to_irc(&msg.content);
            let shown = match state.recent.get(msg.message_id) {
                Some(old) => {
                    let old_text = state.translator.to_irc(&old.content);
                    seirc_core::diffstr(&old_text, &new_text, state.config.edit_context)
                }
                None => new_text,
            };

            if !shown.is_empty() {
                self.send_lines(state, &to_nick(&msg.user.name), &channel, &format!("* {}", shown));
            }
        }

        state.recent.record(&msg);
    }

    fn presence(
        &self,
        state: &mut SessionState,
        me: &ChatUser,
        presence: PresenceEvent,
        line: fn(&str, &str) -> Line,
    ) {
        if presence.user.id == me.id {
            return;
        }
        let Some(channel) = channel_for(state, &presence.room_id) else {
            return;
        };
        state.emit(line(&to_nick(&presence.user.name), &channel));
    }

    /// Emit `text` as PRIVMSGs, one or more per non-blank line
    fn send_lines(&self, state: &mut SessionState, from: &str, channel: &str, text: &str) {
        for line in text.split(['\r', '\n']) {
            if line.trim().is_empty() {
                continue;
            }

            match emote_body(line) {
                Some(body) => {
                    for chunk in split_payload(body, MAX_PAYLOAD_LEN) {
                        state.emit(Line::privmsg(from, channel, &to_action(&chunk)));
                    }
                }
                None => {
                    for chunk in split_payload(line, MAX_PAYLOAD_LEN) {
                        state.emit(Line::privmsg(from, channel, &chunk));
                    }
                }
            }
        }
    }
}

/// Chat markup of a message, in the form this session sends it
fn chat_text(state: &SessionState, html: &str) -> String {
    irc_to_chat(&state.translator.to_irc(html))
}

fn channel_for(state: &SessionState, room_id: &str) -> Option<String> {
    let channel = state.channels.by_room(room_id).map(|b| b.channel.clone());
    if channel.is_none() {
        debug!(room_id = %room_id, "Event for unjoined room, dropping");
    }
    channel
}

/// Inner text of a line wrapped in `*…*` or underline codes
fn emote_body(line: &str) -> Option<&str> {
    ['*', '\x1F'].into_iter().find_map(|mark| {
        line.strip_prefix(mark)
            .and_then(|rest| rest.strip_suffix(mark))
            .filter(|body| !body.is_empty())
    })
}
