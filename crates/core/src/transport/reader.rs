//! Reads length-prefixed frames from a QUIC receive stream

use bytes::{Bytes, BytesMut};
use quinn::RecvStream;
use std::collections::VecDeque;

use crate::error::Result;
use crate::protocol::MessageCodec;

const READ_CHUNK: usize = 8192;

/// Buffered frame reader
///
/// Partial frames stay buffered across reads; several frames arriving in
/// one read are handed out one at a time.
pub struct FrameReader {
    recv: RecvStream,
    buf: BytesMut,
    ready: VecDeque<Bytes>,
}

impl FrameReader {
    pub fn new(recv: RecvStream) -> Self {
        Self {
            recv,
            buf: BytesMut::with_capacity(READ_CHUNK),
            ready: VecDeque::new(),
        }
    }

    /// Next complete payload, `None` once the peer finished the stream
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }

            let n = match self.recv.read(&mut chunk).await? {
                Some(n) => n,
                None => {
                    if !self.buf.is_empty() {
                        tracing::debug!("Stream finished with {} trailing bytes", self.buf.len());
                    }
                    return Ok(None);
                }
            };

            self.buf.extend_from_slice(&chunk[..n]);
            self.ready.extend(MessageCodec::split_frames(&mut self.buf)?);

            if self.buf.is_empty() && self.buf.capacity() > 64 * 1024 {
                self.buf = BytesMut::with_capacity(READ_CHUNK);
            }
        }
    }
}
