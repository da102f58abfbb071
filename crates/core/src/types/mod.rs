//! Domain and wire types for the messaging gateway

mod event;
mod frame;
mod message;

pub use event::GatewayEvent;
pub use frame::{ClientFrame, GatewayCall, GatewayRequest, GatewayResponse, ResponseBody};
pub use message::{now_millis, ChatMessage, Contact, Conversation, PresenceStatus};
