use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::game::{FailReason, ModeListener, NoteHit, NoteMiss};

const FEED_LEN: usize = 6;

/// Recent game messages, newest last. Filled by subscribing a `FeedListener`
/// to the session.
#[derive(Clone, Default)]
pub struct Feed {
    lines: Arc<Mutex<VecDeque<(Color, String)>>>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, color: Color, text: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == FEED_LEN {
                lines.pop_front();
            }
            lines.push_back((color, text.into()));
        }
    }

    pub fn lines(&self) -> Vec<(Color, String)> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn listener(&self) -> Box<FeedListener> {
        Box::new(FeedListener { feed: self.clone() })
    }
}

/// Turns mode events into feed lines.
pub struct FeedListener {
    feed: Feed,
}

impl ModeListener for FeedListener {
    fn on_note_hit(&mut self, hit: &NoteHit) {
        self.feed.push(
            Color::Green,
            format!(
                "{} held  {:+.0}¢  in {:.1}s",
                hit.note,
                hit.average_cents,
                hit.time_to_hit_ms as f32 / 1000.0
            ),
        );
    }

    fn on_note_miss(&mut self, miss: &NoteMiss) {
        self.feed.push(
            Color::Red,
            format!("{} missed after {} attempts", miss.note, miss.attempts),
        );
    }

    fn on_attempt_failed(&mut self, note: &str, attempt: u32) {
        self.feed
            .push(Color::Yellow, format!("{note} slipped (attempt {attempt})"));
    }

    fn on_complete(&mut self) {
        self.feed.push(Color::Green, "Scale complete!");
    }

    fn on_fail(&mut self, reason: FailReason) {
        let text = match reason {
            FailReason::TimeLimitExceeded => "Out of time",
            FailReason::TooManyFailures => "Too many missed notes",
        };
        self.feed.push(Color::Red, text);
    }
}

pub struct FeedWidget<'a> {
    lines: &'a [(Color, String)],
}

impl<'a> FeedWidget<'a> {
    pub fn new(lines: &'a [(Color, String)]) -> Self {
        Self { lines }
    }
}

impl Widget for FeedWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = self
            .lines
            .iter()
            .map(|(color, text)| Line::from(Span::styled(format!(" {text}"), Style::default().fg(*color))))
            .collect();
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .render(area, buf);
    }
}
