//! IRC session: registration and client command handlers

use std::sync::Arc;

use regex::{NoExpand, Regex};
use seirc_core::{ChatRoom, ChatService, MessageHandle, irc_to_chat, to_nick};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::message::{Line, MAX_LINE_LEN, numeric, pack_names};
use crate::registry::Binding;
use crate::state::SessionState;

/// Registration progress of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    /// At least one of NICK, USER or PASS has arrived
    AwaitingCredentials,
    /// Login is in flight
    Authenticating,
    Active,
    Closed,
}

/// What the connection should do after handling an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct Session {
    service: Arc<dyn ChatService>,
    registration: RegistrationState,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
}

impl Session {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            registration: RegistrationState::Unregistered,
            username: None,
            password: None,
        }
    }

    pub fn registration(&self) -> RegistrationState {
        self.registration
    }

    pub fn is_active(&self) -> bool {
        self.registration == RegistrationState::Active
    }

    fn credentials_locked(&self) -> bool {
        matches!(
            self.registration,
            RegistrationState::Authenticating | RegistrationState::Active | RegistrationState::Closed
        )
    }

    fn note_credential(&mut self) {
        if self.registration == RegistrationState::Unregistered {
            self.registration = RegistrationState::AwaitingCredentials;
        }
    }

    fn already_registered(state: &mut SessionState) {
        let reply = state
            .numeric(numeric::ERR_ALREADYREGISTRED)
            .trailing("You may not reregister");
        state.emit(reply);
    }

    pub(crate) fn ping(&mut self, state: &mut SessionState, token: &str) {
        let pong = Line::pong(state.server_name(), token);
        state.emit(pong);
    }

    pub(crate) async fn nick(&mut self, state: &mut SessionState, nick: &str) -> Flow {
        if self.is_active() {
            if let Some(old) = state.nick.as_deref().filter(|old| *old != nick) {
                let line = Line::new("NICK").with_prefix(old).trailing(nick);
                state.emit(line);
            }
        }

        state.nick = Some(nick.to_string());
        self.note_credential();
        self.try_login(state).await
    }

    pub(crate) async fn pass(&mut self, state: &mut SessionState, password: &str) -> Flow {
        if self.password.is_some() || self.credentials_locked() {
            Self::already_registered(state);
            return Flow::Continue;
        }

        self.password = Some(Zeroizing::new(password.to_string()));
        self.note_credential();
        self.try_login(state).await
    }

    pub(crate) async fn user(&mut self, state: &mut SessionState, username: &str) -> Flow {
        if self.username.is_some() || self.credentials_locked() {
            Self::already_registered(state);
            return Flow::Continue;
        }

        self.username = Some(username.to_string());
        self.note_credential();
        self.try_login(state).await
    }

    /// Log in once nick, username and password are all present
    async fn try_login(&mut self, state: &mut SessionState) -> Flow {
        if self.registration != RegistrationState::AwaitingCredentials {
            return Flow::Continue;
        }
        let (Some(username), Some(_), Some(_)) = (&self.username, &state.nick, &self.password) else {
            return Flow::Continue;
        };
        let username = username.clone();
        let Some(password) = self.password.take() else {
            return Flow::Continue;
        };
        self.registration = RegistrationState::Authenticating;

        info!(username = %username, "Logging in to chat");
        let result = self.service.login(&username, &password).await;
        drop(password);

        match result {
            Ok(chat) => {
                let me = chat.me();
                info!(user_id = me.id, name = %me.name, "Logged in");
                state.chat = Some(chat);
                self.registration = RegistrationState::Active;

                let welcome = state
                    .numeric(numeric::RPL_WELCOME)
                    .trailing(format!("Welcome to {}, {}", state.server_name(), state.nick()));
                state.emit(welcome);
                let motd = state.numeric(numeric::RPL_ENDOFMOTD).trailing("End of MOTD");
                state.emit(motd);
                Flow::Continue
            }
            Err(e) => {
                error!(username = %username, "Login failed: {}", e);
                self.registration = RegistrationState::Closed;

                let reply = state
                    .numeric(numeric::ERR_PASSWDMISMATCH)
                    .trailing(e.to_string());
                state.emit(reply);
                let quit = Line::quit(state.nick(), "Login failed");
                state.emit(quit);
                Flow::Close
            }
        }
    }

    pub(crate) async fn join(&mut self, state: &mut SessionState, targets: &str) {
        for target in targets.split(',').filter(|t| !t.is_empty()) {
            self.join_one(state, target).await;
        }
    }

    async fn join_one(&mut self, state: &mut SessionState, target: &str) {
        let target = match target.strip_prefix('#') {
            Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => id,
            _ => target,
        };

        if state.channels.resolve(target).is_some() {
            debug!("Already in {}", target);
            return;
        }
        if target.starts_with('#') {
            debug!("Cannot join {} by name, use a room id", target);
            return;
        }
        let Some(chat) = state.chat.clone() else {
            return;
        };

        let room = match chat.get_room(target).await {
            Ok(room) => room,
            Err(e) => {
                warn!(room_id = %target, "Room lookup failed: {}", e);
                Self::no_such_channel(state, target);
                return;
            }
        };
        if state.channels.by_room(room.id()).is_some() {
            return;
        }
        if let Err(e) = room.join().await {
            warn!(room_id = %target, "Joining room failed: {}", e);
            Self::no_such_channel(state, target);
            return;
        }

        let binding = state.channels.bind(room.id(), room.name()).clone();
        room.subscribe(state.sink());
        info!(room_id = %binding.room_id, channel = %binding.channel, "Joined room");

        let join = Line::join(state.nick(), &binding.channel);
        state.emit(join);
        Self::send_names(state, &binding, room.as_ref()).await;
        Self::send_modes(state, &binding);
    }

    fn no_such_channel(state: &mut SessionState, target: &str) {
        let reply = state
            .numeric(numeric::ERR_NOSUCHCHANNEL)
            .param(target)
            .trailing("No channel with that ID");
        state.emit(reply);
    }

    async fn send_names(state: &mut SessionState, binding: &Binding, room: &dyn ChatRoom) {
        let names = match room.current_member_names().await {
            Ok(names) => names.iter().map(|n| to_nick(n)).collect::<Vec<_>>(),
            Err(e) => {
                warn!(room_id = %binding.room_id, "Member list failed: {}", e);
                Vec::new()
            }
        };

        let header = state
            .numeric(numeric::RPL_NAMREPLY)
            .param("=")
            .param(&binding.channel)
            .trailing("");
        let budget = MAX_LINE_LEN.saturating_sub(header.to_string().len()).max(1);

        let mut chunks = pack_names(&names, budget);
        if chunks.is_empty() {
            chunks.push(String::new());
        }
        for chunk in chunks {
            let reply = header.clone().trailing(chunk);
            state.emit(reply);
        }
        let end = state
            .numeric(numeric::RPL_ENDOFNAMES)
            .param(&binding.channel)
            .trailing("End of NAMES list");
        state.emit(end);
    }

    fn send_modes(state: &mut SessionState, binding: &Binding) {
        let reply = state
            .numeric(numeric::RPL_CHANNELMODEIS)
            .param(&binding.channel)
            .param("+ntr");
        state.emit(reply);
    }

    pub(crate) async fn part(&mut self, state: &mut SessionState, targets: &str) {
        for target in targets.split(',').filter(|t| !t.is_empty()) {
            let Some(binding) = state.channels.unbind(target) else {
                let reply = state
                    .numeric(numeric::ERR_NOTONCHANNEL)
                    .param(target)
                    .trailing("You're not on that channel");
                state.emit(reply);
                continue;
            };

            state.pending_outbound.remove(&binding.channel);
            if let Some(room) = state.chat.as_ref().and_then(|chat| chat.room(&binding.room_id)) {
                if let Err(e) = room.leave().await {
                    warn!(room_id = %binding.room_id, "Leaving room failed: {}", e);
                }
            }

            info!(room_id = %binding.room_id, channel = %binding.channel, "Left room");
            let part = Line::part(state.nick(), &binding.channel);
            state.emit(part);
        }
    }

    pub(crate) async fn names(&mut self, state: &mut SessionState, target: &str) {
        let Some(binding) = state.channels.resolve(target).cloned() else {
            return;
        };
        let Some(room) = state.chat.as_ref().and_then(|chat| chat.room(&binding.room_id)) else {
            return;
        };
        Self::send_names(state, &binding, room.as_ref()).await;
    }

    pub(crate) fn mode(&mut self, state: &mut SessionState, target: &str) {
        if let Some(binding) = state.channels.resolve(target).cloned() {
            Self::send_modes(state, &binding);
        }
    }

    pub(crate) async fn privmsg(&mut self, state: &mut SessionState, target: &str, text: &str) {
        let Some(binding) = state.channels.by_channel(target).cloned() else {
            warn!(target = %target, "Message to unjoined channel");
            Self::cannot_send(state, target);
            return;
        };
        let Some(room) = state.chat.as_ref().and_then(|chat| chat.room(&binding.room_id)) else {
            warn!(room_id = %binding.room_id, "Bound room unknown to chat session");
            Self::cannot_send(state, target);
            return;
        };

        if let Some((find, replace)) = parse_substitution(text) {
            self.edit_last(state, &binding, room.as_ref(), find, replace).await;
            return;
        }

        let text = rewrite_hilight(room.as_ref(), text).await;
        let text = irc_to_chat(&text);

        match room.send_message(&text).await {
            Ok(handle) => {
                debug!(message_id = handle.id, "chat>> {}", text);
                state.pending_outbound.insert(binding.channel, handle);
            }
            Err(e) => {
                warn!(room_id = %binding.room_id, "Send failed: {}", e);
                state.notice(&format!("Message to {} was not sent: {}", binding.channel, e));
            }
        }
    }

    fn cannot_send(state: &mut SessionState, target: &str) {
        let reply = state
            .numeric(numeric::ERR_CANNOTSENDTOCHAN)
            .param(target)
            .trailing("You are not on that channel");
        state.emit(reply);
    }

    async fn edit_last(
        &mut self,
        state: &mut SessionState,
        binding: &Binding,
        room: &dyn ChatRoom,
        find: &str,
        replace: &str,
    ) {
        info!(channel = %binding.channel, "Edit request: /{}/ => {}", find, replace);

        let Some(last) = state.pending_outbound.get(&binding.channel).cloned() else {
            debug!("Nothing sent to {} yet, ignoring edit", binding.channel);
            return;
        };

        let edited = substitute(&last.content, find, replace);
        if edited == last.content {
            return;
        }

        match room.edit_message(last.id, &edited).await {
            Ok(()) => {
                state.pending_outbound.insert(
                    binding.channel.clone(),
                    MessageHandle {
                        content: edited,
                        ..last
                    },
                );
            }
            Err(e) => {
                warn!(message_id = last.id, "Edit failed: {}", e);
                state.notice(&format!("Edit in {} failed: {}", binding.channel, e));
            }
        }
    }

    pub(crate) fn quit(&mut self, _state: &mut SessionState, reason: Option<&str>) -> Flow {
        info!(reason = reason.unwrap_or(""), "Client quit");
        self.registration = RegistrationState::Closed;
        Flow::Close
    }
}

/// Split `s<d>find<d>replace<d>` into its two parts
///
/// The delimiter is any character that is neither alphanumeric nor
/// whitespace. The last inner delimiter separates the parts.
pub fn parse_substitution(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('s')?;
    let delim = rest.chars().next()?;
    if delim.is_alphanumeric() || delim.is_whitespace() {
        return None;
    }

    let body = rest[delim.len_utf8()..].strip_suffix(delim)?;
    body.rsplit_once(delim)
}

/// Replace every match of `find` in `text`
///
/// `find` is a regular expression; if it does not compile it is matched
/// literally. `replace` is always literal.
pub fn substitute(text: &str, find: &str, replace: &str) -> String {
    match Regex::new(find) {
        Ok(re) => re.replace_all(text, NoExpand(replace)).into_owned(),
        Err(_) => text.replace(find, replace),
    }
}

/// Turn a leading `name: ` addressed to a room member into `@nick `
async fn rewrite_hilight(room: &dyn ChatRoom, text: &str) -> String {
    let Some((word, rest)) = text.split_once(": ") else {
        return text.to_string();
    };
    if word.is_empty() || word.contains(char::is_whitespace) {
        return text.to_string();
    }

    match room.pingable_member_names().await {
        Ok(names) => {
            match names.iter().find(|name| name.as_str() == word || to_nick(name) == word) {
                Some(name) => format!("@{} {}", to_nick(name), rest),
                None => text.to_string(),
            }
        }
        Err(e) => {
            debug!("Pingable list failed, sending as is: {}", e);
            text.to_string()
        }
    }
}
