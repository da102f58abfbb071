//! Transport abstraction for the real-time channel

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{CoreError, Result};

/// Something that happened on an open link
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete inbound payload (unframed JSON)
    Message(Bytes),
    /// The remote end closed the link
    Close,
    /// The link failed
    Error(CoreError),
}

/// Outbound half of a link
#[async_trait]
pub trait FrameSink: Send {
    /// Send one payload; framing is the transport's job
    async fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Close the outbound direction
    async fn close(&mut self) -> Result<()>;
}

/// An open link: a sink plus an ordered stream of inbound events
pub struct ChannelLink {
    pub sink: Box<dyn FrameSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl ChannelLink {
    pub fn new(sink: Box<dyn FrameSink>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sink, events }
    }
}

impl std::fmt::Debug for ChannelLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLink").finish_non_exhaustive()
    }
}

/// Opens links to the gateway
///
/// The channel manager calls `open` once per connection attempt.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    async fn open(&self) -> Result<ChannelLink>;
}
