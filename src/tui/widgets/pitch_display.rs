use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::notes;

/// Detected pitch against a target note: note name, a flat/sharp bar and
/// the cents offset.
pub struct PitchDisplayWidget<'a> {
    frequency: Option<f32>,
    target: &'a str,
    tolerance_cents: f32,
}

impl<'a> PitchDisplayWidget<'a> {
    pub fn new(frequency: Option<f32>, target: &'a str, tolerance_cents: f32) -> Self {
        Self {
            frequency,
            target,
            tolerance_cents,
        }
    }
}

/// Green inside the tolerance, yellow up to twice it, red beyond.
fn accuracy_color(cents: f32, tolerance: f32) -> Color {
    let off = cents.abs();
    if off <= tolerance {
        Color::Green
    } else if off <= tolerance * 2.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Marker column for a cents offset on a bar `width` wide, +/-100 cents full scale.
fn marker_position(cents: f32, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    let center = width / 2;
    let offset = ((cents / 100.0).clamp(-1.0, 1.0) * center as f32).round() as i32;
    (center as i32 + offset).clamp(0, width as i32 - 1) as usize
}

impl Widget for PitchDisplayWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" Target {} ", self.target))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width as usize;
        let rows = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

        let matched = self.frequency.and_then(|hz| {
            notes::check_note_match(hz, self.target, self.tolerance_cents)
                .ok()
                .map(|m| (hz, m))
        });

        let Some((hz, m)) = matched else {
            let line = Line::from(Span::styled(
                format!("{:^width$}", "---"),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            ));
            Paragraph::new(line).render(rows[0], buf);
            return;
        };

        let color = accuracy_color(m.cents, self.tolerance_cents);
        let sung = notes::midi_to_note_name(notes::frequency_to_midi(hz));
        Paragraph::new(Line::from(Span::styled(
            format!("{sung:^width$}"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .render(rows[0], buf);

        let bar_width = width.saturating_sub(2);
        if bar_width > 0 {
            let mut bar = vec!['━'; bar_width];
            bar[bar_width / 2] = '┃';
            bar[marker_position(m.cents, bar_width)] = '●';
            let bar: String = bar.into_iter().collect();
            Paragraph::new(Line::from(Span::styled(
                format!("♭{bar}♯"),
                Style::default().fg(color),
            )))
            .render(rows[1], buf);
        }

        let info = format!("{:+.0} cents  ({hz:.1} Hz)", m.cents);
        Paragraph::new(Line::from(Span::styled(
            format!("{info:^width$}"),
            Style::default().fg(Color::DarkGray),
        )))
        .render(rows[2], buf);
    }
}
