use std::sync::mpsc;
use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Events consumed by a screen loop.
pub enum AppEvent {
    Key(KeyEvent),
    /// No input arrived within one frame.
    Tick,
}

/// What a key press means to the game screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Confirm,
    Up,
    Down,
    OctaveUp,
    OctaveDown,
}

impl Action {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Confirm),
            KeyCode::Up | KeyCode::Right => Some(Action::Up),
            KeyCode::Down | KeyCode::Left => Some(Action::Down),
            KeyCode::Char('+') | KeyCode::PageUp => Some(Action::OctaveUp),
            KeyCode::Char('-') | KeyCode::PageDown => Some(Action::OctaveDown),
            _ => None,
        }
    }
}

/// Polls crossterm on a background thread, sending key events as they
/// arrive and a `Tick` whenever a frame passes without input.
pub struct EventHandler {
    rx: mpsc::Receiver<AppEvent>,
    _handle: std::thread::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(frame: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        let handle = std::thread::spawn(move || loop {
            let event = match event::poll(frame) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => AppEvent::Key(key),
                    Ok(_) => continue,
                    Err(_) => return,
                },
                Ok(false) => AppEvent::Tick,
                Err(_) => return,
            };
            if tx.send(event).is_err() {
                return;
            }
        });

        Self {
            rx,
            _handle: handle,
        }
    }

    /// Block until the next event.
    pub fn next(&self) -> Result<AppEvent, mpsc::RecvError> {
        self.rx.recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn key_bindings() {
        assert_eq!(Action::from_key(&press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(Action::from_key(&press(KeyCode::Enter)), Some(Action::Confirm));
        assert_eq!(Action::from_key(&press(KeyCode::Left)), Some(Action::Down));
        assert_eq!(Action::from_key(&press(KeyCode::Char('+'))), Some(Action::OctaveUp));
        assert_eq!(Action::from_key(&press(KeyCode::Char('x'))), None);
        assert_eq!(
            Action::from_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
    }
}
