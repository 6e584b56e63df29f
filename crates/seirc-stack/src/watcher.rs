//! Room event watcher
//!
//! Polls a joined room's event feed and forwards typed events to the
//! session's sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use seirc_core::{EventSink, FeedItem};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::api::StackApi;

/// Consecutive poll failures before the backend counts as lost
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

pub struct RoomWatcher {
    api: Arc<StackApi>,
    room_id: String,
    cursor: u64,
    sink: EventSink,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl RoomWatcher {
    pub fn new(api: Arc<StackApi>, room_id: &str, cursor: u64, sink: EventSink, poll_interval: Duration) -> Self {
        Self {
            api,
            room_id: room_id.to_string(),
            cursor,
            sink,
            poll_interval,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag that stops the watcher once cleared
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Poll until stopped, the sink closes or the backend is lost
    pub async fn run(mut self) {
        info!(room_id = %self.room_id, "Starting room watcher (poll interval: {:?})", self.poll_interval);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0;

        loop {
            ticker.tick().await;
            if !self.running.load(Ordering::SeqCst) || self.sink.is_closed() {
                break;
            }

            match self.api.poll(&self.room_id, self.cursor).await {
                Ok(section) => {
                    failures = 0;
                    if let Some(cursor) = section.t {
                        self.cursor = cursor;
                    }

                    let mut events = section.e;
                    events.sort_by_key(|e| e.id);
                    for raw in events {
                        let Some(event) = raw.into_chat_event() else {
                            debug!(room_id = %self.room_id, "Skipping incomplete event");
                            continue;
                        };
                        if !self.running.load(Ordering::SeqCst) || self.sink.send(FeedItem::Event(event)).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(room_id = %self.room_id, failures, "Error polling events: {}", e);
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        let _ = self.sink.send(FeedItem::Lost(e.to_string()));
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(room_id = %self.room_id, "Room watcher stopped");
    }
}
