//! Command dispatch
//!
//! Parses a client line into a [`Command`], looks its verb up in a fixed
//! table and hands it to the matching [`Session`] handler. Verbs outside
//! the table are logged and ignored.

use tracing::debug;

use crate::message::numeric;
use crate::session::{Flow, Session};
use crate::state::SessionState;

/// A line from the client, split into verb and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased verb
    pub verb: String,
    /// Whitespace-separated arguments, then the `:` trailing argument if any
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let (head, trailing) = match line.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (line, None),
        };

        let mut words = head.split_whitespace().peekable();
        if words.peek().is_some_and(|w| w.starts_with(':')) {
            words.next();
        }

        let verb = words.next()?.to_ascii_lowercase();
        let mut args: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            args.push(trailing.to_string());
        }

        Some(Self { verb, args })
    }
}

/// Verbs the gateway handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Ping,
    Nick,
    Pass,
    User,
    Join,
    Part,
    Names,
    Mode,
    Privmsg,
    Quit,
}

impl Verb {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(Verb::Ping),
            "nick" => Some(Verb::Nick),
            "pass" => Some(Verb::Pass),
            "user" => Some(Verb::User),
            "join" => Some(Verb::Join),
            "part" => Some(Verb::Part),
            "names" => Some(Verb::Names),
            "mode" => Some(Verb::Mode),
            "privmsg" => Some(Verb::Privmsg),
            "quit" => Some(Verb::Quit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Ping => "PING",
            Verb::Nick => "NICK",
            Verb::Pass => "PASS",
            Verb::User => "USER",
            Verb::Join => "JOIN",
            Verb::Part => "PART",
            Verb::Names => "NAMES",
            Verb::Mode => "MODE",
            Verb::Privmsg => "PRIVMSG",
            Verb::Quit => "QUIT",
        }
    }

    /// Arguments required before the handler runs
    pub fn min_args(self) -> usize {
        match self {
            Verb::Quit => 0,
            Verb::User => 4,
            Verb::Privmsg => 2,
            _ => 1,
        }
    }

    /// Whether the verb needs a logged-in session
    pub fn requires_active(self) -> bool {
        matches!(
            self,
            Verb::Join | Verb::Part | Verb::Names | Verb::Mode | Verb::Privmsg
        )
    }
}

/// Handle one client line
pub async fn dispatch(session: &mut Session, state: &mut SessionState, line: &str) -> Flow {
    let Some(command) = Command::parse(line) else {
        return Flow::Continue;
    };

    if command.verb == "pass" {
        debug!("<<irc PASS ****");
    } else {
        debug!("<<irc {}", line);
    }

    let Some(verb) = Verb::from_name(&command.verb) else {
        debug!("Unknown command from IRC: {}", line);
        return Flow::Continue;
    };

    if command.args.len() < verb.min_args() {
        let reply = state
            .numeric(numeric::ERR_NEEDMOREPARAMS)
            .param(verb.as_str())
            .trailing("Not enough parameters");
        state.emit(reply);
        return Flow::Continue;
    }

    if verb.requires_active() && !session.is_active() {
        let reply = state
            .numeric(numeric::ERR_NOTREGISTERED)
            .trailing("You have not registered");
        state.emit(reply);
        return Flow::Continue;
    }

    let args = &command.args;
    match verb {
        Verb::Ping => session.ping(state, &args[0]),
        Verb::Nick => return session.nick(state, &args[0]).await,
        Verb::Pass => return session.pass(state, &args[0]).await,
        Verb::User => return session.user(state, &args[3]).await,
        Verb::Join => session.join(state, &args[0]).await,
        Verb::Part => session.part(state, &args[0]).await,
        Verb::Names => session.names(state, &args[0]).await,
        Verb::Mode => session.mode(state, &args[0]),
        Verb::Privmsg => session.privmsg(state, &args[0], &args[1]).await,
        Verb::Quit => return session.quit(state, args.first().map(String::as_str)),
    }

    Flow::Continue
}
