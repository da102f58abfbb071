//! Inbound real-time events pushed by the gateway

use serde::{Deserialize, Serialize};

use super::{ChatMessage, Conversation, PresenceStatus};

/// Event received on the real-time channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Handshake accepted
    Ready { session_id: String },

    /// New message in a conversation
    MessageCreated { message: ChatMessage },

    /// A contact's presence changed
    PresenceChanged { user_id: String, status: PresenceStatus },

    /// Conversation metadata changed (title, unread count, ...)
    ConversationUpdated { conversation: Conversation },

    /// Conversation marked read from another device
    MessageRead { conversation_id: String },

    /// Heartbeat reply
    Pong { timestamp: u64 },

    /// Gateway-side failure reported on the channel
    Error { status: u16, message: String },
}

impl GatewayEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Ready { .. } => "ready",
            GatewayEvent::MessageCreated { .. } => "message_created",
            GatewayEvent::PresenceChanged { .. } => "presence_changed",
            GatewayEvent::ConversationUpdated { .. } => "conversation_updated",
            GatewayEvent::MessageRead { .. } => "message_read",
            GatewayEvent::Pong { .. } => "pong",
            GatewayEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_presence_event() {
        let json = r#"{"type":"presence_changed","user_id":"bob","status":"online"}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            GatewayEvent::PresenceChanged {
                user_id: "bob".into(),
                status: PresenceStatus::Online,
            }
        );
        assert_eq!(event.kind(), "presence_changed");
    }

    #[test]
    fn test_parse_message_event() {
        let json = r#"{"type":"message_created","message":{"id":"m1","conversation_id":"c1","sender":"bob","body":"hi","timestamp":5}}"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        match event {
            GatewayEvent::MessageCreated { message } => {
                assert_eq!(message.body, "hi");
                assert_eq!(message.conversation_id, "c1");
            }
            other => panic!("Expected MessageCreated, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let json = r#"{"type":"sticker_pack_added","id":"x"}"#;
        assert!(serde_json::from_str::<GatewayEvent>(json).is_err());
    }
}
