//! seirc-irc: the IRC side of the gateway
//!
//! One IRC connection pairs with one chat session. Lines from the client go
//! through the [`dispatch`] table into the [`Session`]; chat events go
//! through the [`EventRouter`]. Both act on the connection's
//! [`SessionState`] from a single task, so no locking is involved.

pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod fake;

pub use codec::IrcCodec;
pub use connection::run_connection;
pub use dispatch::{Command, Verb, dispatch};
pub use error::{IrcError, Result};
pub use message::Line;
pub use registry::{Binding, ChannelRegistry};
pub use router::EventRouter;
pub use server::{serve, start_server};
pub use session::{Flow, RegistrationState, Session};
pub use state::SessionState;
