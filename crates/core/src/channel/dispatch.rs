//! Applies inbound gateway events to the store

use crate::error::Result;
use crate::protocol::MessageCodec;
use crate::store::{ConnectivityPatch, Store};
use crate::types::GatewayEvent;

/// Decode one inbound payload
pub fn decode_event(payload: &[u8]) -> Result<GatewayEvent> {
    MessageCodec::from_payload(payload)
}

/// Apply a decoded event to the store
pub fn apply_event(store: &Store, event: GatewayEvent) {
    tracing::debug!("Channel event: {}", event.kind());

    match event {
        GatewayEvent::Ready { session_id } => {
            tracing::info!("Channel session ready: {}", session_id);
        }
        GatewayEvent::MessageCreated { message } => store.receive_message(message),
        GatewayEvent::PresenceChanged { user_id, status } => store.set_presence(&user_id, status),
        GatewayEvent::ConversationUpdated { conversation } => store.upsert_conversation(conversation),
        GatewayEvent::MessageRead { conversation_id } => store.mark_read(&conversation_id),
        GatewayEvent::Pong { timestamp } => {
            tracing::trace!("Pong {}", timestamp);
        }
        GatewayEvent::Error { status, message } => {
            tracing::warn!("Gateway reported error {}: {}", status, message);
            store.set_connectivity(ConnectivityPatch {
                last_error: Some(Some(format!("{}: {}", status, message))),
                ..Default::default()
            });
        }
    }
}

/// Decode and apply; undecodable payloads are logged and dropped
pub fn dispatch_payload(store: &Store, payload: &[u8]) {
    match decode_event(payload) {
        Ok(event) => apply_event(store, event),
        Err(e) => tracing::warn!("Dropping undecodable channel payload ({} bytes): {}", payload.len(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, Conversation, PresenceStatus};

    #[test]
    fn test_message_created_updates_store() {
        let store = Store::new();
        let payload = serde_json::to_vec(&GatewayEvent::MessageCreated {
            message: ChatMessage {
                id: "m1".into(),
                conversation_id: "c1".into(),
                sender: "alice".into(),
                body: "hi".into(),
                timestamp: 1,
            },
        })
        .unwrap();

        dispatch_payload(&store, &payload);
        let conversations = store.conversations().get();
        assert_eq!(conversations.messages_for("c1").len(), 1);
        assert_eq!(conversations.conversation("c1").unwrap().unread, 1);
    }

    #[test]
    fn test_presence_and_read_events() {
        let store = Store::new();
        let mut conv = Conversation::new("c1", "Team");
        conv.unread = 4;
        apply_event(&store, GatewayEvent::ConversationUpdated { conversation: conv });
        apply_event(
            &store,
            GatewayEvent::PresenceChanged {
                user_id: "bob".into(),
                status: PresenceStatus::Composing,
            },
        );
        apply_event(&store, GatewayEvent::MessageRead { conversation_id: "c1".into() });

        assert_eq!(store.presence().get().of("bob"), PresenceStatus::Composing);
        assert_eq!(store.conversations().get().conversation("c1").unwrap().unread, 0);
    }

    #[test]
    fn test_error_event_recorded() {
        let store = Store::new();
        apply_event(
            &store,
            GatewayEvent::Error {
                status: 503,
                message: "overloaded".into(),
            },
        );
        assert_eq!(store.connectivity().get().last_error.as_deref(), Some("503: overloaded"));
    }

    #[test]
    fn test_garbage_payload_dropped() {
        let store = Store::new();
        dispatch_payload(&store, b"not json");
        dispatch_payload(&store, br#"{"type":"unknown_event"}"#);
        assert_eq!(store.version(), 0);
    }
}
