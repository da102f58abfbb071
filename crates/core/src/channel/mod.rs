//! Real-time channel to the gateway
//!
//! Connection lifecycle, reconnect backoff, activity heartbeats and the idle
//! presence fallback. Inbound events are applied to the [`Store`](crate::store::Store).

pub mod dispatch;
pub mod heartbeat;
pub mod manager;
pub mod mock;
pub mod transport;

pub use dispatch::{apply_event, decode_event, dispatch_payload};
pub use heartbeat::ActivityTracker;
pub use manager::{ChannelConfig, ChannelManager};
pub use mock::MockTransport;
pub use transport::{ChannelLink, ChannelTransport, FrameSink, TransportEvent};
