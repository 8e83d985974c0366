use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

/// Answer to a "press Enter to begin" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    Go,
    Cancel,
}

fn classify(code: KeyCode, modifiers: KeyModifiers) -> Option<Ready> {
    match code {
        KeyCode::Enter => Some(Ready::Go),
        KeyCode::Esc | KeyCode::Char('q') => Some(Ready::Cancel),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Ready::Cancel),
        _ => None,
    }
}

/// Block until Enter (go) or Esc/q/Ctrl-C (cancel), using crossterm raw mode.
pub fn wait_for_enter() -> Result<Ready> {
    crossterm::terminal::enable_raw_mode()?;

    let answer = loop {
        match event::poll(std::time::Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                crossterm::terminal::disable_raw_mode()?;
                return Err(e.into());
            }
        }
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(answer) = classify(key.code, key.modifiers) {
                break answer;
            }
        }
    };

    crossterm::terminal::disable_raw_mode()?;
    Ok(answer)
}
