//! Key bindings

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gatechat_core::store::View;

/// What a key press asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectNext,
    SelectPrevious,
    PageDown,
    PageUp,
    Open,
    Back,
    Send,
    Type(char),
    Backspace,
    ToggleTimestamps,
    Quit,
    Ignore,
}

/// Map a key to an action for the current view
///
/// Letters are commands in the list and text in a conversation.
pub fn map_key(key: KeyEvent, view: View) -> Action {
    if key.kind == KeyEventKind::Release {
        return Action::Ignore;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    if view.is_list() {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Action::SelectPrevious,
            KeyCode::Down | KeyCode::Char('j') => Action::SelectNext,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::Enter => Action::Open,
            KeyCode::Char('t') => Action::ToggleTimestamps,
            KeyCode::Char('q') => Action::Quit,
            _ => Action::Ignore,
        }
    } else {
        match key.code {
            KeyCode::Esc => Action::Back,
            KeyCode::Enter => Action::Send,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => Action::Type(c),
            _ => Action::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_list_navigation_keys() {
        let list = View::ConversationList;
        assert_eq!(map_key(press(KeyCode::Down), list), Action::SelectNext);
        assert_eq!(map_key(press(KeyCode::Char('k')), list), Action::SelectPrevious);
        assert_eq!(map_key(press(KeyCode::PageDown), list), Action::PageDown);
        assert_eq!(map_key(press(KeyCode::Enter), list), Action::Open);
        assert_eq!(map_key(press(KeyCode::Char('t')), list), Action::ToggleTimestamps);
        assert_eq!(map_key(press(KeyCode::Char('q')), list), Action::Quit);
    }

    #[test]
    fn test_letters_are_text_in_conversation() {
        let view = View::Conversation;
        assert_eq!(map_key(press(KeyCode::Char('q')), view), Action::Type('q'));
        assert_eq!(map_key(press(KeyCode::Char('t')), view), Action::Type('t'));
        assert_eq!(map_key(press(KeyCode::Enter), view), Action::Send);
        assert_eq!(map_key(press(KeyCode::Esc), view), Action::Back);
        assert_eq!(map_key(press(KeyCode::Backspace), view), Action::Backspace);
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_c, View::ConversationList), Action::Quit);
        assert_eq!(map_key(ctrl_c, View::Conversation), Action::Quit);
    }

    #[test]
    fn test_key_release_ignored() {
        let mut key = press(KeyCode::Down);
        key.kind = KeyEventKind::Release;
        assert_eq!(map_key(key, View::ConversationList), Action::Ignore);
    }
}
