use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

/// State of one rung of the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rung {
    Pending,
    Current,
    Hit,
    Missed,
}

/// The eight scale notes in a row, colored by how each one went.
pub struct ScaleLadderWidget<'a> {
    notes: &'a [String],
    rungs: Vec<Rung>,
}

impl<'a> ScaleLadderWidget<'a> {
    /// `missed` holds the indices of notes that ran out of attempts.
    pub fn new(notes: &'a [String], current: usize, missed: &[usize]) -> Self {
        let rungs = (0..notes.len())
            .map(|i| {
                if missed.contains(&i) {
                    Rung::Missed
                } else if i < current {
                    Rung::Hit
                } else if i == current {
                    Rung::Current
                } else {
                    Rung::Pending
                }
            })
            .collect();
        Self { notes, rungs }
    }

    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }
}

impl Widget for ScaleLadderWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = Vec::with_capacity(self.notes.len() * 2);
        for (note, rung) in self.notes.iter().zip(&self.rungs) {
            let style = match rung {
                Rung::Hit => Style::default().fg(Color::Green),
                Rung::Missed => Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::CROSSED_OUT),
                Rung::Current => Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
                Rung::Pending => Style::default().fg(Color::DarkGray),
            };
            spans.push(Span::styled(format!(" {note} "), style));
            spans.push(Span::raw(" "));
        }

        Paragraph::new(Line::from(spans))
            .block(Block::default().title(" Scale ").borders(Borders::ALL))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rung_states() {
        let notes = crate::notes::c_major_scale(4);
        let ladder = ScaleLadderWidget::new(&notes, 3, &[1]);
        assert_eq!(
            &ladder.rungs()[..5],
            &[Rung::Hit, Rung::Missed, Rung::Hit, Rung::Current, Rung::Pending]
        );
    }
}
