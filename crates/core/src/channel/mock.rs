//! In-memory transport for tests and offline runs

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::transport::{ChannelLink, ChannelTransport, FrameSink, TransportEvent};
use crate::error::{CoreError, Result};
use crate::protocol::MessageCodec;
use crate::types::ClientFrame;

#[derive(Default)]
struct MockState {
    /// Scripted results for upcoming `open` calls; empty means success
    outcomes: VecDeque<Result<()>>,
    opens: usize,
    sent: Vec<Bytes>,
    closed_links: usize,
    /// Injector for the most recently opened link
    inbound: Option<mpsc::Sender<TransportEvent>>,
    fail_sends: bool,
}

/// Mock transport
///
/// Every `open` consumes one scripted outcome (success when none is left).
/// Sent payloads are recorded; tests push inbound events and closures onto
/// the current link.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> std::sync::MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `count` failing opens with the given error factory
    pub fn fail_next_opens(&self, count: usize, make_error: impl Fn() -> CoreError) {
        let mut state = lock(&self.state);
        for _ in 0..count {
            state.outcomes.push_back(Err(make_error()));
        }
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self, fail: bool) {
        lock(&self.state).fail_sends = fail;
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).opens
    }

    pub fn closed_links(&self) -> usize {
        lock(&self.state).closed_links
    }

    /// Raw payloads sent so far, across all links
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        lock(&self.state).sent.clone()
    }

    /// Sent payloads decoded as client frames
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.sent_payloads()
            .iter()
            .filter_map(|p| MessageCodec::from_payload(p).ok())
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.state).sent.clear();
    }

    /// Deliver an event on the current link
    pub async fn inject(&self, event: TransportEvent) -> Result<()> {
        let sender = lock(&self.state).inbound.clone().ok_or(CoreError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|_| CoreError::ConnectionClosed)
    }

    /// Serialize and deliver a gateway message on the current link
    pub async fn inject_message<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = MessageCodec::to_payload(value)?;
        self.inject(TransportEvent::Message(payload)).await
    }

    /// Simulate the gateway closing the current link
    pub async fn close_remote(&self) -> Result<()> {
        self.inject(TransportEvent::Close).await
    }

    /// Drop the current link's event sender so its stream ends with `None`
    pub fn drop_link(&self) {
        lock(&self.state).inbound.take();
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn open(&self) -> Result<ChannelLink> {
        let mut state = lock(&self.state);
        state.opens += 1;
        if let Some(Err(e)) = state.outcomes.pop_front() {
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(64);
        state.inbound = Some(tx);
        let sink = MockSink {
            state: Arc::clone(&self.state),
            closed: false,
        };
        Ok(ChannelLink::new(Box::new(sink), rx))
    }
}

struct MockSink {
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        if self.closed {
            return Err(CoreError::ConnectionClosed);
        }
        let mut state = lock(&self.state);
        if state.fail_sends {
            return Err(CoreError::ConnectionReset("mock send failure".into()));
        }
        state.sent.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).closed_links += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_open_outcomes() {
        let transport = MockTransport::new();
        transport.fail_next_opens(2, || CoreError::ConnectionRefused("ECONNREFUSED".into()));

        assert!(transport.open().await.is_err());
        assert!(transport.open().await.is_err());
        assert!(transport.open().await.is_ok());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_sent_frames_recorded() {
        let transport = MockTransport::new();
        let mut link = transport.open().await.unwrap();
        let payload = MessageCodec::to_payload(&ClientFrame::activity("c1")).unwrap();
        link.sink.send(payload).await.unwrap();

        assert_eq!(transport.sent_frames(), vec![ClientFrame::activity("c1")]);
        link.sink.close().await.unwrap();
        assert!(link.sink.send(Bytes::from_static(b"{}")).await.is_err());
        assert_eq!(transport.closed_links(), 1);
    }

    #[tokio::test]
    async fn test_inject_reaches_link() {
        let transport = MockTransport::new();
        assert!(transport.close_remote().await.is_err());

        let mut link = transport.open().await.unwrap();
        transport.close_remote().await.unwrap();
        assert!(matches!(link.events.recv().await, Some(TransportEvent::Close)));
    }

    #[tokio::test]
    async fn test_drop_link_ends_event_stream() {
        let transport = MockTransport::new();
        let mut link = transport.open().await.unwrap();
        transport.drop_link();
        assert!(link.events.recv().await.is_none());
        assert!(transport.close_remote().await.is_err());
    }
}
