//! Reactive application state
//!
//! The store is split into slices that are read and written independently.
//! Every `set` replaces the slice snapshot, records the change reason, then
//! notifies the slice's listeners followed by the store-wide listeners, all
//! before returning.

mod listeners;
mod slice;
mod state;

pub use listeners::Subscription;
pub use slice::{Slice, SliceState};
pub use state::{
    ChangeReason, ConnectionStatus, ConnectivityPatch, ConnectivityState, ConversationsPatch,
    ConversationsState, NavigationPatch, NavigationState, PresencePatch, PresenceState,
    SettingsPatch, SettingsState, View,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use listeners::{lock, Listeners};
use slice::SliceObserver;

use crate::types::{ChatMessage, Contact, Conversation, PresenceStatus};

/// Read-only merged view of every slice
#[derive(Debug, Clone)]
pub struct AppState {
    pub connectivity: Arc<ConnectivityState>,
    pub navigation: Arc<NavigationState>,
    pub conversations: Arc<ConversationsState>,
    pub presence: Arc<PresenceState>,
    pub settings: Arc<SettingsState>,
    /// Reason of the most recent `set` on any slice
    pub last_change: ChangeReason,
    /// Total number of `set` calls across slices
    pub version: u64,
}

struct StoreInner {
    connectivity: Slice<ConnectivityState>,
    navigation: Slice<NavigationState>,
    conversations: Slice<ConversationsState>,
    presence: Slice<PresenceState>,
    settings: Slice<SettingsState>,
    last_change: Mutex<ChangeReason>,
    version: AtomicU64,
    listeners: Listeners<AppState>,
}

impl StoreInner {
    fn snapshot(&self) -> AppState {
        AppState {
            connectivity: self.connectivity.get(),
            navigation: self.navigation.get(),
            conversations: self.conversations.get(),
            presence: self.presence.get(),
            settings: self.settings.get(),
            last_change: *lock(&self.last_change),
            version: self.version.load(Ordering::SeqCst),
        }
    }
}

impl SliceObserver for StoreInner {
    fn record(&self, slice: &'static str, reason: ChangeReason) {
        *lock(&self.last_change) = reason;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("store: {} changed ({:?}), version {}", slice, reason, version);
    }

    fn changed(&self) {
        let state = self.snapshot();
        self.listeners.notify(&state);
    }
}

/// Shared handle to the application state
///
/// Cloning is cheap; all clones see the same slices.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version())
            .field("last_change", &self.last_change())
            .finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_settings(SettingsState::default())
    }

    /// Store whose settings slice starts from persisted preferences
    pub fn with_settings(settings: SettingsState) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let observer: Weak<dyn SliceObserver> = weak.clone();
            StoreInner {
                connectivity: Slice::observed("connectivity", Default::default(), observer.clone()),
                navigation: Slice::observed("navigation", Default::default(), observer.clone()),
                conversations: Slice::observed("conversations", Default::default(), observer.clone()),
                presence: Slice::observed("presence", Default::default(), observer.clone()),
                settings: Slice::observed("settings", settings, observer),
                last_change: Mutex::new(ChangeReason::Initial),
                version: AtomicU64::new(0),
                listeners: Listeners::new(),
            }
        });
        Self { inner }
    }

    pub fn connectivity(&self) -> &Slice<ConnectivityState> {
        &self.inner.connectivity
    }

    pub fn navigation(&self) -> &Slice<NavigationState> {
        &self.inner.navigation
    }

    pub fn conversations(&self) -> &Slice<ConversationsState> {
        &self.inner.conversations
    }

    pub fn presence(&self) -> &Slice<PresenceState> {
        &self.inner.presence
    }

    pub fn settings(&self) -> &Slice<SettingsState> {
        &self.inner.settings
    }

    /// Merged snapshot of every slice
    pub fn get_state(&self) -> AppState {
        self.inner.snapshot()
    }

    pub fn last_change(&self) -> ChangeReason {
        *lock(&self.inner.last_change)
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Register a listener called after any slice changes
    pub fn subscribe(&self, listener: impl Fn(&AppState) + Send + Sync + 'static) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }

    // -- navigation -------------------------------------------------------

    /// Move the highlight, clamped to the conversation list
    pub fn select(&self, index: usize) {
        let len = self.conversations().get().conversations.len();
        let index = index.min(len.saturating_sub(1));
        if self.navigation().get().selected_index == index {
            return;
        }
        self.navigation().set(NavigationPatch {
            selected_index: Some(index),
            ..Default::default()
        });
    }

    pub fn select_next(&self) {
        let current = self.navigation().get().selected_index;
        self.select(current.saturating_add(1));
    }

    pub fn select_previous(&self) {
        let current = self.navigation().get().selected_index;
        self.select(current.saturating_sub(1));
    }

    pub fn scroll_to(&self, offset: usize) {
        if self.navigation().get().scroll_offset == offset {
            return;
        }
        self.navigation().set(NavigationPatch {
            scroll_offset: Some(offset),
            ..Default::default()
        });
    }

    pub fn show_view(&self, view: View) {
        self.navigation().set(NavigationPatch {
            view: Some(view),
            ..Default::default()
        });
    }

    /// Open a conversation: switch view, then clear its unread count
    pub fn open_conversation(&self, conversation_id: &str) {
        self.navigation().set(NavigationPatch {
            view: Some(View::Conversation),
            active_conversation: Some(Some(conversation_id.to_string())),
            draft: Some(String::new()),
            ..Default::default()
        });
        self.mark_read(conversation_id);
    }

    /// Open the conversation under the highlight, if any
    pub fn open_selected(&self) -> Option<String> {
        let index = self.navigation().get().selected_index;
        let id = self.conversations().get().conversations.get(index)?.id.clone();
        self.open_conversation(&id);
        Some(id)
    }

    pub fn close_conversation(&self) {
        self.navigation().set(NavigationPatch {
            view: Some(View::ConversationList),
            active_conversation: Some(None),
            draft: Some(String::new()),
            ..Default::default()
        });
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        self.navigation().set(NavigationPatch {
            draft: Some(draft.into()),
            ..Default::default()
        });
    }

    // -- conversations ----------------------------------------------------

    /// Apply a fetched conversation list, keeping the viewport in range
    ///
    /// Summaries updated by live messages after the fetch was issued win
    /// over the fetched copy; see [`merge_conversations`].
    pub fn set_conversations(&self, fetched: Vec<Conversation>) {
        self.conversations().update(|current| ConversationsPatch {
            conversations: Some(merge_conversations(&current.conversations, fetched)),
            ..Default::default()
        });

        let last = self.conversations().get().conversations.len().saturating_sub(1);
        let nav = self.navigation().get();
        let patch = NavigationPatch {
            selected_index: (nav.selected_index > last).then_some(last),
            scroll_offset: (nav.scroll_offset > last).then_some(last),
            ..Default::default()
        };
        if patch.selected_index.is_some() || patch.scroll_offset.is_some() {
            self.navigation().set(patch);
        }
    }

    /// Insert or replace a conversation summary
    pub fn upsert_conversation(&self, conversation: Conversation) {
        self.conversations().update(|current| {
            let mut conversations = current.conversations.clone();
            match conversations.iter_mut().find(|c| c.id == conversation.id) {
                Some(existing) => *existing = conversation,
                None => conversations.insert(0, conversation),
            }
            ConversationsPatch {
                conversations: Some(conversations),
                ..Default::default()
            }
        });
    }

    /// Apply fetched history, keeping messages that arrived live
    pub fn set_history(&self, conversation_id: &str, history: Vec<ChatMessage>) {
        self.conversations().update(|current| {
            let mut messages = current.messages.clone();
            let live = messages.remove(conversation_id).unwrap_or_default();
            messages.insert(conversation_id.to_string(), merge_history(history, live));
            ConversationsPatch {
                messages: Some(messages),
                ..Default::default()
            }
        });
    }

    /// Append a message and bump its conversation to the top
    ///
    /// Unread counts only grow for conversations that are not open.
    /// A message already present (same id) is ignored.
    pub fn receive_message(&self, message: ChatMessage) {
        let open = self.navigation().get().active_conversation.clone();
        let is_open = open.as_deref() == Some(message.conversation_id.as_str());

        self.conversations().update(|current| {
            let mut messages = current.messages.clone();
            let history = messages.entry(message.conversation_id.clone()).or_default();
            let duplicate = history.iter().any(|m| m.id == message.id);
            if !duplicate {
                history.push(message.clone());
            }

            let mut conversations = current.conversations.clone();
            let mut entry = match conversations.iter().position(|c| c.id == message.conversation_id) {
                Some(pos) => conversations.remove(pos),
                None => Conversation::new(message.conversation_id.clone(), message.sender.clone()),
            };
            if !duplicate {
                entry.last_message_at = Some(message.timestamp);
                entry.last_message_preview = Some(message.body.clone());
                if !is_open {
                    entry.unread += 1;
                }
            }
            conversations.insert(0, entry);

            ConversationsPatch {
                conversations: Some(conversations),
                messages: Some(messages),
                ..Default::default()
            }
        });
    }

    pub fn mark_read(&self, conversation_id: &str) {
        let unread = self
            .conversations()
            .get()
            .conversation(conversation_id)
            .map(|c| c.unread)
            .unwrap_or(0);
        if unread == 0 {
            return;
        }
        self.conversations().update(|current| {
            let conversations = current
                .conversations
                .iter()
                .cloned()
                .map(|mut c| {
                    if c.id == conversation_id {
                        c.unread = 0;
                    }
                    c
                })
                .collect();
            ConversationsPatch {
                conversations: Some(conversations),
                ..Default::default()
            }
        });
    }

    /// Replace contacts and seed their presence
    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        let presence = contacts.iter().map(|c| (c.user_id.clone(), c.presence)).collect();
        self.conversations().set(ConversationsPatch {
            contacts: Some(contacts),
            ..Default::default()
        });
        self.presence().set(PresencePatch {
            contacts: Some(presence),
            ..Default::default()
        });
    }

    // -- presence / connectivity / settings --------------------------------

    pub fn set_presence(&self, user_id: &str, status: PresenceStatus) {
        self.presence().update(|current| {
            let mut contacts = current.contacts.clone();
            contacts.insert(user_id.to_string(), status);
            PresencePatch {
                contacts: Some(contacts),
                ..Default::default()
            }
        });
    }

    pub fn set_own_presence(&self, status: PresenceStatus) {
        self.presence().set(PresencePatch {
            own: Some(status),
            ..Default::default()
        });
    }

    pub fn set_connectivity(&self, patch: ConnectivityPatch) {
        self.connectivity().set(patch);
    }

    pub fn update_settings(&self, patch: SettingsPatch) {
        self.settings().set(patch);
    }

    pub fn toggle_timestamps(&self) {
        self.settings().update(|current| SettingsPatch {
            show_timestamps: Some(!current.show_timestamps),
            ..Default::default()
        });
    }
}

/// Fetched messages plus live ones the fetch lacks, deduped by id and
/// ordered by timestamp
fn merge_history(fetched: Vec<ChatMessage>, live: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    let mut merged: Vec<ChatMessage> = fetched
        .into_iter()
        .chain(live)
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    merged.sort_by_key(|m| m.timestamp);
    merged
}

/// Reconcile a fetched list with the live one
///
/// A live entry with a newer `last_message_at` than its fetched copy keeps
/// its time and preview, the larger unread count, and its place on top.
/// Live entries missing from the fetch are kept only if they carry a
/// message. Everything else follows the fetched order.
fn merge_conversations(live: &[Conversation], mut fetched: Vec<Conversation>) -> Vec<Conversation> {
    let mut merged = Vec::with_capacity(fetched.len());
    for local in live {
        match fetched.iter().position(|c| c.id == local.id) {
            Some(pos) if local.last_message_at > fetched[pos].last_message_at => {
                let mut conversation = fetched.remove(pos);
                conversation.last_message_at = local.last_message_at;
                conversation.last_message_preview = local.last_message_preview.clone();
                conversation.unread = conversation.unread.max(local.unread);
                merged.push(conversation);
            }
            None if local.last_message_at.is_some() => merged.push(local.clone()),
            _ => {}
        }
    }
    merged.extend(fetched);
    merged
}
