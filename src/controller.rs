use std::io::stdout;
use std::time::Duration;
use tracing::{trace, warn};

use ratatui::crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use ratatui::crossterm::execute;
use sift::domain::{Message, SiftConfig, SiftError};
use sift::editor::PointerCapture;

use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &SiftConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SiftError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(_) => Some(Message::PointerDown(mouse.column, mouse.row)),
                _ => None,
            },
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('j') | KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k') | KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('h') | KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Char('l') | KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Char('g') | KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G') | KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Char('s'), _) => Some(Message::CycleSort),
            (KeyCode::Char('f'), _) => Some(Message::EditFilter),
            (KeyCode::Char('/'), _) => Some(Message::EditSearch),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilter),
            (KeyCode::Char('C'), _) => Some(Message::ClearAll),
            (KeyCode::Char('y'), _) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRecord),
            (KeyCode::Char('w'), _) => Some(Message::Export),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

/// Turns terminal mouse reporting on while a filter editor is open.
#[derive(Debug, Default)]
pub struct TerminalMouseCapture;

impl PointerCapture for TerminalMouseCapture {
    fn subscribe(&mut self) {
        if let Err(e) = execute!(stdout(), EnableMouseCapture) {
            warn!("Could not enable mouse capture: {e}");
        }
    }

    fn unsubscribe(&mut self) {
        if let Err(e) = execute!(stdout(), DisableMouseCapture) {
            warn!("Could not disable mouse capture: {e}");
        }
    }
}
