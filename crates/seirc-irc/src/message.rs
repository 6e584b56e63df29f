//! Outbound IRC lines
//!
//! Everything the gateway writes to a client is a [`Line`]. Numeric replies
//! carry the configured server name as prefix and the client's nick as the
//! first parameter.

use std::fmt;

/// Numeric reply codes the gateway emits
pub mod numeric {
    pub const RPL_WELCOME: &str = "001";
    pub const RPL_CHANNELMODEIS: &str = "324";
    pub const RPL_NAMREPLY: &str = "353";
    pub const RPL_ENDOFNAMES: &str = "366";
    pub const RPL_ENDOFMOTD: &str = "376";
    pub const ERR_NOSUCHCHANNEL: &str = "403";
    pub const ERR_CANNOTSENDTOCHAN: &str = "404";
    pub const ERR_NOTONCHANNEL: &str = "442";
    pub const ERR_NOTREGISTERED: &str = "451";
    pub const ERR_NEEDMOREPARAMS: &str = "461";
    pub const ERR_ALREADYREGISTRED: &str = "462";
    pub const ERR_PASSWDMISMATCH: &str = "464";
}

/// Longest line a client is guaranteed to accept, CRLF excluded
pub const MAX_LINE_LEN: usize = 510;

/// Payload budget for relayed PRIVMSG text, leaving room for prefix and target
pub const MAX_PAYLOAD_LEN: usize = 400;

/// A single IRC line, serialized without the trailing CRLF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl Line {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params: Vec::new(),
            trailing: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn trailing(mut self, text: impl Into<String>) -> Self {
        self.trailing = Some(text.into());
        self
    }

    /// `:<nick> PRIVMSG <target> :<text>`
    pub fn privmsg(from: &str, target: &str, text: &str) -> Self {
        Self::new("PRIVMSG").with_prefix(from).param(target).trailing(text)
    }

    /// `:<nick> JOIN <channel>`
    pub fn join(nick: &str, channel: &str) -> Self {
        Self::new("JOIN").with_prefix(nick).param(channel)
    }

    /// `:<nick> PART <channel>`
    pub fn part(nick: &str, channel: &str) -> Self {
        Self::new("PART").with_prefix(nick).param(channel)
    }

    /// `:<nick> QUIT :<reason>`
    pub fn quit(nick: &str, reason: &str) -> Self {
        Self::new("QUIT").with_prefix(nick).trailing(reason)
    }

    /// `:<server> PONG <server> :<token>`
    pub fn pong(server: &str, token: &str) -> Self {
        Self::new("PONG").with_prefix(server).param(server).trailing(token)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{}", trailing)?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_bytes`, preferring whitespace breaks
pub fn split_payload(text: &str, max_bytes: usize) -> Vec<String> {
    if text.len() <= max_bytes {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > max_bytes {
        let mut cut = max_bytes;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }

        let (head, tail) = match rest[..cut].rfind(' ') {
            Some(pos) if pos > 0 => (&rest[..pos], &rest[pos + 1..]),
            _ => rest.split_at(cut),
        };

        chunks.push(head.to_string());
        rest = tail;
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Pack names into as few `353` payloads as fit under `budget` bytes
pub fn pack_names(names: &[String], budget: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for name in names {
        if !current.is_empty() && current.len() + 1 + name.len() > budget {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(name);
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}
