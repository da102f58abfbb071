//! Screen drawing with crossterm
//!
//! The conversation list is drawn from rows kept in a [`RenderCache`]; the
//! conversation view is cheap enough to redraw from the state every time.

use chrono::{DateTime, Local};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use gatechat_core::render::{RenderCache, RowRenderer};
use gatechat_core::store::{AppState, ConnectionStatus};
use gatechat_core::types::{ChatMessage, Conversation};
use std::io::{self, Write};

/// One drawn list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: String,
    pub selected: bool,
}

/// Formats conversation rows for the terminal list
#[derive(Debug, Default)]
pub struct ListRenderer {
    pub show_timestamps: bool,
    pub scroll: usize,
    /// Rows built since the last draw, for the status line
    pub built: usize,
}

impl ListRenderer {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            show_timestamps,
            ..Self::default()
        }
    }
}

impl RowRenderer for ListRenderer {
    type Item = Conversation;
    type Handle = Row;

    fn create_row(&mut self, _index: usize, item: &Conversation, selected: bool) -> Row {
        self.built += 1;
        Row {
            line: format_row(item, self.show_timestamps),
            selected,
        }
    }

    fn destroy_row(&mut self, _handle: Row) {}

    fn set_selected(&mut self, handle: &mut Row, selected: bool) {
        handle.selected = selected;
    }

    fn set_scroll(&mut self, offset: usize) {
        self.scroll = offset;
    }
}

pub fn format_row(conversation: &Conversation, show_timestamps: bool) -> String {
    let mut line = String::new();
    if show_timestamps {
        let time = conversation.last_message_at.map(format_time).unwrap_or_default();
        line.push_str(&format!("{:>5} ", time));
    }
    line.push_str(&conversation.title);
    if conversation.unread > 0 {
        line.push_str(&format!(" ({})", conversation.unread));
    }
    if let Some(preview) = &conversation.last_message_preview {
        line.push_str(" - ");
        line.push_str(preview);
    }
    line
}

/// Local `HH:MM` for a millisecond Unix timestamp
pub fn format_time(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_default()
}

pub fn format_message(message: &ChatMessage, show_timestamps: bool) -> String {
    if show_timestamps {
        format!("[{}] {}: {}", format_time(message.timestamp), message.sender, message.body)
    } else {
        format!("{}: {}", message.sender, message.body)
    }
}

pub fn status_line(state: &AppState, notice: Option<&str>) -> String {
    let connectivity = &state.connectivity;
    let mut line = match connectivity.status {
        ConnectionStatus::Reconnecting => {
            format!("reconnecting (attempt {})", connectivity.reconnect_attempt)
        }
        status => status.to_string(),
    };
    if let Some(error) = &connectivity.last_error {
        line.push_str(&format!(" | {}", error));
    }
    let unread = state.conversations.total_unread();
    if unread > 0 {
        line.push_str(&format!(" | {} unread", unread));
    }
    if let Some(notice) = notice {
        line.push_str(&format!(" | {}", notice));
    }
    line
}

fn truncate(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}

/// Number of list rows that fit above the status line
pub fn visible_rows(height: u16) -> usize {
    usize::from(height.saturating_sub(2)).max(1)
}

pub fn draw_list<W: Write>(
    out: &mut W,
    cache: &RenderCache<ListRenderer>,
    state: &AppState,
    notice: Option<&str>,
    (width, height): (u16, u16),
) -> io::Result<()> {
    let width = usize::from(width);
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    queue!(
        out,
        SetAttribute(Attribute::Bold),
        Print(truncate("Conversations  [Enter] open  [t] timestamps  [q] quit", width)),
        SetAttribute(Attribute::Reset)
    )?;

    let scroll = cache.renderer().scroll;
    for (line, row) in cache.rows().skip(scroll).take(visible_rows(height)).enumerate() {
        let y = u16::try_from(line + 1).unwrap_or(u16::MAX);
        queue!(out, MoveTo(0, y))?;
        if row.selected {
            queue!(out, SetAttribute(Attribute::Reverse))?;
        }
        queue!(out, Print(truncate(&row.line, width)), SetAttribute(Attribute::Reset))?;
    }
    if cache.is_empty() {
        queue!(out, MoveTo(0, 1), Print("No conversations yet"))?;
    }

    draw_status(out, state, notice, width, height)?;
    out.flush()
}

pub fn draw_conversation<W: Write>(
    out: &mut W,
    state: &AppState,
    notice: Option<&str>,
    (width, height): (u16, u16),
) -> io::Result<()> {
    let width = usize::from(width);
    let nav = &state.navigation;
    let Some(id) = nav.active_conversation.as_deref() else {
        return Ok(());
    };
    let title = state
        .conversations
        .conversation(id)
        .map(|c| c.title.as_str())
        .unwrap_or(id);

    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    queue!(
        out,
        SetAttribute(Attribute::Bold),
        Print(truncate(&format!("{}  [Esc] back", title), width)),
        SetAttribute(Attribute::Reset)
    )?;

    let messages = state.conversations.messages_for(id);
    let room = usize::from(height.saturating_sub(3));
    let first = messages.len().saturating_sub(room);
    for (line, message) in messages[first..].iter().enumerate() {
        let y = u16::try_from(line + 1).unwrap_or(u16::MAX);
        let text = format_message(message, state.settings.show_timestamps);
        queue!(out, MoveTo(0, y), Print(truncate(&text, width)))?;
    }

    queue!(
        out,
        MoveTo(0, height.saturating_sub(2)),
        Print(truncate(&format!("> {}", nav.draft), width))
    )?;
    draw_status(out, state, notice, width, height)?;
    out.flush()
}

fn draw_status<W: Write>(
    out: &mut W,
    state: &AppState,
    notice: Option<&str>,
    width: usize,
    height: u16,
) -> io::Result<()> {
    queue!(
        out,
        MoveTo(0, height.saturating_sub(1)),
        SetAttribute(Attribute::Dim),
        Print(truncate(&status_line(state, notice), width)),
        SetAttribute(Attribute::Reset)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatechat_core::render::RenderStrategy;
    use gatechat_core::store::Store;

    fn conversation(id: &str, title: &str, unread: u32) -> Conversation {
        Conversation {
            unread,
            last_message_preview: Some("see you".into()),
            ..Conversation::new(id, title)
        }
    }

    #[test]
    fn test_format_row_without_timestamps() {
        let line = format_row(&conversation("c1", "Team", 2), false);
        assert_eq!(line, "Team (2) - see you");
    }

    #[test]
    fn test_format_row_reserves_time_column() {
        let line = format_row(&conversation("c1", "Team", 0), true);
        assert!(line.starts_with("      Team"));
    }

    #[test]
    fn test_selection_moves_without_rebuilding_rows() {
        let store = Store::new();
        store.set_conversations(vec![
            conversation("c1", "Team", 0),
            conversation("c2", "Ops", 1),
            conversation("c3", "Family", 0),
        ]);
        let mut cache = RenderCache::new(ListRenderer::new(false));

        let state = store.get_state();
        let items = state.conversations.conversations.clone();
        cache.render(&state, &items, false);
        assert_eq!(cache.renderer().built, 3);

        store.select(2);
        let state = store.get_state();
        assert_eq!(cache.render(&state, &items, false), RenderStrategy::FastPath);
        assert_eq!(cache.renderer().built, 3);

        let selected: Vec<bool> = cache.rows().map(|row| row.selected).collect();
        assert_eq!(selected, vec![false, false, true]);
    }

    #[test]
    fn test_draw_list_prints_rows_and_status() {
        let store = Store::new();
        store.set_conversations(vec![conversation("c1", "Team", 3)]);
        let state = store.get_state();
        let mut cache = RenderCache::new(ListRenderer::new(false));
        cache.render(&state, &state.conversations.conversations, false);

        let mut out = Vec::new();
        draw_list(&mut out, &cache, &state, Some("loading"), (80, 10)).unwrap();
        let screen = String::from_utf8_lossy(&out);
        assert!(screen.contains("Team (3)"));
        assert!(screen.contains("3 unread"));
        assert!(screen.contains("loading"));
    }

    #[test]
    fn test_status_line_shows_reconnect_attempt() {
        use gatechat_core::store::ConnectivityPatch;

        let store = Store::new();
        store.set_connectivity(
            ConnectivityPatch::status(ConnectionStatus::Reconnecting)
                .with_attempt(2)
                .with_error(Some("connection refused".into())),
        );
        let line = status_line(&store.get_state(), None);
        assert_eq!(line, "reconnecting (attempt 2) | connection refused");
    }
}
