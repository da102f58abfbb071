//! Gatechat Core - client core for the Gatechat terminal messenger
//!
//! This crate provides:
//! - Domain and wire types (conversations, messages, channel frames)
//! - Retry policy executor with exponential backoff
//! - Reactive state store
//! - Real-time channel manager (reconnect, heartbeat, idle presence)
//! - Incremental render cache for list views
//! - QUIC transport with certificate pinning

// Version constants
pub const PROTOCOL_VERSION: u32 = 1;
pub const APP_VERSION_STRING: &str = "0.1.0";

pub mod auth;
pub mod channel;
pub mod config;
pub mod error;
pub mod protocol;
pub mod render;
pub mod retry;
pub mod store;
pub mod transport;
pub mod types;

// Re-export common types
pub use auth::{AuthToken, Credentials};
pub use channel::{ChannelConfig, ChannelManager, MockTransport};
pub use config::ClientConfig;
pub use error::{CoreError, Result};
pub use protocol::MessageCodec;
pub use render::{RenderCache, RenderStrategy, RowRenderer};
pub use retry::{retryable, with_retry, RetryConfig, RetryPreset};
pub use store::{AppState, ChangeReason, Store};
pub use transport::{GatewayClient, QuicTransport};
pub use types::{ClientFrame, GatewayEvent};
