//! IRC line codec
//!
//! Frames the client byte stream on `\r\n`, also accepting a bare `\n`.
//! Invalid UTF-8 is replaced rather than rejected. A line longer than
//! [`MAX_LINE_LENGTH`] is discarded up to its terminator and the stream
//! carries on.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::message::Line;

/// Longest inbound line accepted, terminator included
pub const MAX_LINE_LENGTH: usize = 8191;

#[derive(Debug, Default)]
pub struct IrcCodec {
    discarding: bool,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    if !self.discarding {
                        warn!("Discarding line over {} bytes", MAX_LINE_LENGTH);
                    }
                    self.discarding = true;
                    src.clear();
                }
                return Ok(None);
            };

            let line_bytes = src.split_to(pos);
            src.advance(1);

            if self.discarding || line_bytes.len() > MAX_LINE_LENGTH {
                self.discarding = false;
                continue;
            }

            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() {
                continue;
            }

            return Ok(Some(line.to_string()));
        }
    }
}

impl Encoder<Line> for IrcCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Line, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // CR, LF and NUL inside a line would let relayed text forge extra lines
        let wire: String = item
            .to_string()
            .chars()
            .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
            .collect();
        dst.reserve(wire.len() + 2);
        dst.put_slice(wire.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
