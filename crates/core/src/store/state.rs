//! Slice state types and their patches

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::slice::SliceState;
use crate::types::{ChatMessage, Contact, Conversation, PresenceStatus};

/// What kind of change produced the latest snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeReason {
    /// No change yet
    #[default]
    Initial,
    /// Highlighted row moved
    Selection,
    /// Viewport scrolled
    Scroll,
    /// View or active conversation changed
    Navigation,
    /// Composer text changed
    Draft,
    /// Conversations, messages or contacts changed
    Data,
    Connectivity,
    Presence,
    Settings,
}

impl ChangeReason {
    /// Changes that only move the highlight or viewport of a list
    pub fn is_view_only(self) -> bool {
        matches!(self, ChangeReason::Selection | ChangeReason::Scroll)
    }
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub status: ConnectionStatus,
    /// Consecutive failed attempts since the last successful connect
    pub reconnect_attempt: u32,
    /// Unix ms of the last local user activity
    pub last_activity_at: Option<u64>,
    pub last_error: Option<String>,
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityPatch {
    pub status: Option<ConnectionStatus>,
    pub reconnect_attempt: Option<u32>,
    pub last_activity_at: Option<u64>,
    pub last_error: Option<Option<String>>,
}

impl ConnectivityPatch {
    pub fn status(status: ConnectionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.reconnect_attempt = Some(attempt);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }
}

impl SliceState for ConnectivityState {
    type Patch = ConnectivityPatch;

    fn apply(&mut self, patch: ConnectivityPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(attempt) = patch.reconnect_attempt {
            self.reconnect_attempt = attempt;
        }
        if let Some(at) = patch.last_activity_at {
            self.last_activity_at = Some(at);
        }
        if let Some(error) = patch.last_error {
            self.last_error = error;
        }
    }

    fn classify(_patch: &ConnectivityPatch) -> ChangeReason {
        ChangeReason::Connectivity
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    ConversationList,
    Conversation,
    Contacts,
    Settings,
}

impl View {
    /// Views drawn through the row cache
    pub fn is_list(self) -> bool {
        matches!(self, View::ConversationList | View::Contacts)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub view: View,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub active_conversation: Option<String>,
    pub draft: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationPatch {
    pub view: Option<View>,
    pub selected_index: Option<usize>,
    pub scroll_offset: Option<usize>,
    pub active_conversation: Option<Option<String>>,
    pub draft: Option<String>,
}

impl SliceState for NavigationState {
    type Patch = NavigationPatch;

    fn apply(&mut self, patch: NavigationPatch) {
        if let Some(view) = patch.view {
            self.view = view;
        }
        if let Some(index) = patch.selected_index {
            self.selected_index = index;
        }
        if let Some(offset) = patch.scroll_offset {
            self.scroll_offset = offset;
        }
        if let Some(active) = patch.active_conversation {
            self.active_conversation = active;
        }
        if let Some(draft) = patch.draft {
            self.draft = draft;
        }
    }

    fn classify(patch: &NavigationPatch) -> ChangeReason {
        if patch.view.is_some() || patch.active_conversation.is_some() {
            ChangeReason::Navigation
        } else if patch.draft.is_some() {
            ChangeReason::Draft
        } else if patch.selected_index.is_some() {
            ChangeReason::Selection
        } else if patch.scroll_offset.is_some() {
            ChangeReason::Scroll
        } else {
            ChangeReason::Navigation
        }
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationsState {
    /// Newest activity first
    pub conversations: Vec<Conversation>,
    /// Loaded history keyed by conversation id, oldest first
    pub messages: BTreeMap<String, Vec<ChatMessage>>,
    pub contacts: Vec<Contact>,
}

impl ConversationsState {
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == id)
    }

    pub fn messages_for(&self, id: &str) -> &[ChatMessage] {
        self.messages.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationsPatch {
    pub conversations: Option<Vec<Conversation>>,
    pub messages: Option<BTreeMap<String, Vec<ChatMessage>>>,
    pub contacts: Option<Vec<Contact>>,
}

impl SliceState for ConversationsState {
    type Patch = ConversationsPatch;

    fn apply(&mut self, patch: ConversationsPatch) {
        if let Some(conversations) = patch.conversations {
            self.conversations = conversations;
        }
        if let Some(messages) = patch.messages {
            self.messages = messages;
        }
        if let Some(contacts) = patch.contacts {
            self.contacts = contacts;
        }
    }

    fn classify(_patch: &ConversationsPatch) -> ChangeReason {
        ChangeReason::Data
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    /// Last known presence per user id
    pub contacts: BTreeMap<String, PresenceStatus>,
    /// Presence this client advertises
    pub own: PresenceStatus,
}

impl PresenceState {
    pub fn of(&self, user_id: &str) -> PresenceStatus {
        self.contacts.get(user_id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresencePatch {
    pub contacts: Option<BTreeMap<String, PresenceStatus>>,
    pub own: Option<PresenceStatus>,
}

impl SliceState for PresenceState {
    type Patch = PresencePatch;

    fn apply(&mut self, patch: PresencePatch) {
        if let Some(contacts) = patch.contacts {
            self.contacts = contacts;
        }
        if let Some(own) = patch.own {
            self.own = own;
        }
    }

    fn classify(_patch: &PresencePatch) -> ChangeReason {
        ChangeReason::Presence
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User preferences, persisted with the client config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsState {
    pub show_timestamps: bool,
    pub notifications: bool,
    pub compact: bool,
    /// Messages requested per history page
    pub page_size: usize,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            notifications: true,
            compact: false,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub show_timestamps: Option<bool>,
    pub notifications: Option<bool>,
    pub compact: Option<bool>,
    pub page_size: Option<usize>,
}

impl SliceState for SettingsState {
    type Patch = SettingsPatch;

    fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.show_timestamps {
            self.show_timestamps = v;
        }
        if let Some(v) = patch.notifications {
            self.notifications = v;
        }
        if let Some(v) = patch.compact {
            self.compact = v;
        }
        if let Some(v) = patch.page_size {
            self.page_size = v;
        }
    }

    fn classify(_patch: &SettingsPatch) -> ChangeReason {
        ChangeReason::Settings
    }
}
