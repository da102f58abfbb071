//! Conversation, message and presence types shared by the store and the wire

use serde::{Deserialize, Serialize};

/// A chat message as delivered by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub body: String,
    /// Unix timestamp (milliseconds)
    pub timestamp: u64,
}

/// Conversation summary shown in the list view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub unread: u32,
    /// Unix timestamp (milliseconds) of the newest message
    #[serde(default)]
    pub last_message_at: Option<u64>,
    #[serde(default)]
    pub last_message_preview: Option<String>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            unread: 0,
            last_message_at: None,
            last_message_preview: None,
        }
    }
}

/// A contact known to the account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub presence: PresenceStatus,
}

/// Presence as tracked by the gateway
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    #[default]
    Offline,
    /// Logged in but not interacting
    Available,
    /// Actively looking at a conversation
    Online,
    /// Typing in a conversation
    Composing,
}

impl PresenceStatus {
    pub fn is_active(self) -> bool {
        matches!(self, PresenceStatus::Online | PresenceStatus::Composing)
    }
}

/// Unix timestamp in milliseconds
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
