use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use contact_tv::{ListError, Message};

use crate::model::Model;

#[derive(Default)]
pub struct Controller {}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a pending terminal event without blocking.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, ListError> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(handle_key(key))
                }
            }
            Event::Resize(width, height) => Ok(Some(Message::Resize(width as usize, height as usize))),
            _ => Ok(None),
        }
    }
}

fn handle_key(key: KeyEvent) -> Option<Message> {
    let message = match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
        (KeyCode::Char('q'), _) => Some(Message::Quit),
        (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
        (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
        (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
        (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
        (KeyCode::Char('n'), _) | (KeyCode::PageDown, _) => Some(Message::NextPage),
        (KeyCode::Char('p'), _) | (KeyCode::PageUp, _) => Some(Message::PrevPage),
        (KeyCode::Char(']'), _) => Some(Message::NextLocalPage),
        (KeyCode::Char('['), _) => Some(Message::PrevLocalPage),
        (KeyCode::Home, _) | (KeyCode::Char('g'), _) => Some(Message::FirstLocalPage),
        (KeyCode::End, _) | (KeyCode::Char('G'), _) => Some(Message::LastLocalPage),
        (KeyCode::Char('s'), _) => Some(Message::ToggleServerSort),
        (KeyCode::Char('a'), _) => Some(Message::SortAscending),
        (KeyCode::Char('z'), _) => Some(Message::SortDescending),
        (KeyCode::Char('/'), _) => Some(Message::Search),
        (KeyCode::Char('f'), _) => Some(Message::Filter),
        (KeyCode::Char('x'), _) => Some(Message::ClearFilters),
        (KeyCode::Char('d'), _) => Some(Message::Delete),
        (KeyCode::Char('r'), _) => Some(Message::Reload),
        (KeyCode::Char('b'), _) | (KeyCode::Backspace, _) => Some(Message::Back),
        (KeyCode::Char('e'), _) => Some(Message::Export),
        (KeyCode::Char('y'), _) => Some(Message::CopyRow),
        (KeyCode::Char('?'), _) => Some(Message::Help),
        (KeyCode::Enter, _) => Some(Message::Enter),
        (KeyCode::Esc, _) => Some(Message::Exit),
        _ => None,
    };
    trace!("Mapped: {key:?} => {message:?}");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn list_keys_map_to_messages() {
        assert_eq!(handle_key(key(KeyCode::Char('q'))), Some(Message::Quit));
        assert_eq!(handle_key(key(KeyCode::Char('n'))), Some(Message::NextPage));
        assert_eq!(handle_key(key(KeyCode::Char(']'))), Some(Message::NextLocalPage));
        assert_eq!(handle_key(key(KeyCode::Home)), Some(Message::FirstLocalPage));
        assert_eq!(
            handle_key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(Message::LastLocalPage)
        );
        assert_eq!(handle_key(key(KeyCode::Char('s'))), Some(Message::ToggleServerSort));
        assert_eq!(handle_key(key(KeyCode::Esc)), Some(Message::Exit));
        assert_eq!(handle_key(key(KeyCode::Char('w'))), None);
        assert_eq!(
            handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        );
    }
}
