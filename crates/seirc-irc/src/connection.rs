//! Per-connection event loop
//!
//! Client lines and chat feed items are handled one at a time on this task.
//! Lines a handler queues are written out before the next input is taken.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use seirc_core::{ChatService, Config, TextTranslator};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::IrcCodec;
use crate::dispatch::dispatch;
use crate::error::Result;
use crate::router::EventRouter;
use crate::session::{Flow, Session};
use crate::state::SessionState;

/// Serve one IRC client until it quits, disconnects or its session ends
pub async fn run_connection<S>(stream: S, service: Arc<dyn ChatService>, config: Arc<Config>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let translator = TextTranslator::new(config.chat.origin_url()?);
    let (sink, mut feed) = mpsc::unbounded_channel();
    let mut state = SessionState::new(config.irc.clone(), translator, sink);
    let mut session = Session::new(service);
    let router = EventRouter::new();
    let mut framed = Framed::new(stream, IrcCodec::new());

    let result = loop {
        let flow = tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(line)) => dispatch(&mut session, &mut state, &line).await,
                Some(Err(e)) => break Err(e.into()),
                None => {
                    info!("Client closed connection");
                    break Ok(());
                }
            },
            Some(item) = feed.recv() => router.route(&mut state, item),
        };

        if let Err(e) = flush(&mut framed, &mut state).await {
            break Err(e);
        }
        if flow == Flow::Close {
            break Ok(());
        }
    };

    state.teardown().await;
    result
}

async fn flush<S>(framed: &mut Framed<S, IrcCodec>, state: &mut SessionState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let lines = state.take_outbox();
    if lines.is_empty() {
        return Ok(());
    }
    for line in lines {
        debug!("irc>> {}", line);
        framed.feed(line).await?;
    }
    framed.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, message};
    use seirc_core::ChatEvent;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, duplex};
    use tokio_test::assert_ok;

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: tokio::io::WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{}\r\n", line).as_bytes()).await.unwrap();
        }

        async fn expect(&mut self, expected: &str) {
            let line = self.lines.next_line().await.unwrap().unwrap();
            assert_eq!(line.trim_end_matches('\r'), expected);
        }
    }

    fn start(backend: &FakeBackend) -> (Client, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = duplex(64 * 1024);
        let service: Arc<dyn ChatService> = Arc::new(backend.clone());
        let handle = tokio::spawn(run_connection(server, service, Arc::new(Config::default())));

        let (reader, writer) = tokio::io::split(client);
        let client = Client {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        (client, handle)
    }

    #[tokio::test]
    async fn test_register_join_and_relay() {
        let backend = FakeBackend::new().with_room("123", "Sandbox Room", &["alice", "bob"]);
        let (mut client, handle) = start(&backend);

        client.send("NICK bob").await;
        client.send("USER x x x :bob@example.com").await;
        client.send("PASS hunter2").await;
        client.expect(":SEIRC 001 bob :Welcome to SEIRC, bob").await;
        client.expect(":SEIRC 376 bob :End of MOTD").await;

        client.send("JOIN 123").await;
        client.expect(":bob JOIN #sandbox-room").await;
        client.expect(":SEIRC 353 bob = #sandbox-room :alice bob").await;
        client.expect(":SEIRC 366 bob #sandbox-room :End of NAMES list").await;
        client.expect(":SEIRC 324 bob #sandbox-room +ntr").await;

        let mut event = message(ChatEvent::MessagePosted, 10, 7, "alice", "hello <i>there</i>");
        if let seirc_core::FeedItem::Event(ChatEvent::MessagePosted(m)) = &mut event {
            m.room_id = "123".to_string();
        }
        backend.push("123", event);
        client.expect(":alice PRIVMSG #sandbox-room :hello \x1Fthere\x1F").await;

        client.send("PRIVMSG #sandbox-room :hi alice").await;
        client.send("QUIT :bye").await;

        assert_ok!(handle.await.unwrap());
        assert_eq!(backend.sent(), vec![("123".to_string(), "hi alice".to_string())]);
        assert_eq!(backend.logouts(), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_logs_out() {
        let backend = FakeBackend::new();
        let (mut client, handle) = start(&backend);

        client.send("NICK bob").await;
        client.send("USER x x x :bob").await;
        client.send("PASS pw").await;
        client.expect(":SEIRC 001 bob :Welcome to SEIRC, bob").await;
        drop(client);

        assert_ok!(handle.await.unwrap());
        assert_eq!(backend.logouts(), 1);
    }

    #[tokio::test]
    async fn test_backend_loss_ends_connection() {
        let backend = FakeBackend::new().with_room("1", "Lobby", &["bob"]);
        let (mut client, handle) = start(&backend);

        client.send("NICK bob").await;
        client.send("USER x x x :bob").await;
        client.send("PASS pw").await;
        client.send("JOIN 1").await;
        for _ in 0..6 {
            client.lines.next_line().await.unwrap();
        }

        backend.push("1", seirc_core::FeedItem::Lost("poll failed".to_string()));
        client.expect(":bob QUIT :Connection to backend lost").await;

        assert_ok!(handle.await.unwrap());
        assert!(client.lines.next_line().await.unwrap().is_none());
    }
}
