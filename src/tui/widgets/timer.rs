use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

/// Time readout. Counts up by default; `countdown` shows time left and turns
/// red in the last 15 seconds.
pub struct TimerWidget {
    ms: u64,
    countdown: bool,
    title: &'static str,
}

impl TimerWidget {
    pub fn elapsed(ms: u64) -> Self {
        Self {
            ms,
            countdown: false,
            title: " Time ",
        }
    }

    pub fn countdown(remaining_ms: u64) -> Self {
        Self {
            ms: remaining_ms,
            countdown: true,
            title: " Remaining ",
        }
    }
}

pub fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}.{}", secs / 60, secs % 60, (ms % 1000) / 100)
}

impl Widget for TimerWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let color = if self.countdown && self.ms <= 15_000 {
            Color::Red
        } else {
            Color::White
        };

        let line = Line::from(Span::styled(
            format_clock(self.ms),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));

        Paragraph::new(line)
            .block(Block::default().title(self.title).borders(Borders::ALL))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "0:00.0");
        assert_eq!(format_clock(61_250), "1:01.2");
        assert_eq!(format_clock(120_000), "2:00.0");
    }
}
