//! Real-time channel over a QUIC bidirectional stream

use async_trait::async_trait;
use bytes::Bytes;
use quinn::{Connection, SendStream};
use tokio::sync::mpsc;

use super::reader::FrameReader;
use super::Connector;
use crate::channel::{ChannelLink, ChannelTransport, FrameSink, TransportEvent};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::protocol::MessageCodec;

/// Inbound events buffered per link before the receive task waits
const EVENT_QUEUE: usize = 256;

/// Opens one QUIC connection and bi stream per channel link
pub struct QuicTransport {
    connector: Connector,
}

impl QuicTransport {
    pub fn new(gateway: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            connector: Connector::new(gateway)?,
        })
    }

    pub fn with_connector(connector: Connector) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl ChannelTransport for QuicTransport {
    async fn open(&self) -> Result<ChannelLink> {
        let connection = self.connector.connect().await?;
        let (send, recv) = connection.open_bi().await?;

        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(receive_loop(FrameReader::new(recv), tx));

        let sink = QuicSink {
            send,
            connection,
            closed: false,
        };
        Ok(ChannelLink::new(Box::new(sink), rx))
    }
}

/// Pushes every inbound frame to the link until the stream ends
async fn receive_loop(mut reader: FrameReader, events: mpsc::Sender<TransportEvent>) {
    tracing::debug!("Channel receive task started");
    loop {
        let event = match reader.next_frame().await {
            Ok(Some(payload)) => TransportEvent::Message(payload),
            Ok(None) => {
                tracing::info!("Gateway finished the channel stream");
                let _ = events.send(TransportEvent::Close).await;
                break;
            }
            Err(e) => {
                tracing::warn!("Channel read failed: {}", e);
                let _ = events.send(TransportEvent::Error(e)).await;
                break;
            }
        };

        if events.send(event).await.is_err() {
            tracing::debug!("Channel link dropped");
            break;
        }
    }
    tracing::debug!("Channel receive task ended");
}

struct QuicSink {
    send: SendStream,
    connection: Connection,
    closed: bool,
}

impl QuicSink {
    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.send.finish();
        self.connection.close(0u32.into(), b"close");
    }
}

#[async_trait]
impl FrameSink for QuicSink {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let framed = MessageCodec::frame(&payload);
        self.send.write_all(&framed).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for QuicSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
