use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, LineGauge, Widget};

/// Input level meter. Takes the detector's volume, already scaled to 0..1.
pub struct VolumeMeterWidget {
    level: f32,
    /// Level below which the detector is unlikely to lock on.
    quiet_below: f32,
}

impl VolumeMeterWidget {
    pub fn new(level: f32) -> Self {
        Self {
            level,
            quiet_below: 0.05,
        }
    }
}

impl Widget for VolumeMeterWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let ratio = self.level.clamp(0.0, 1.0) as f64;

        let color = if self.level < self.quiet_below {
            Color::DarkGray
        } else if ratio < 0.85 {
            Color::Green
        } else {
            Color::Red
        };

        let label = if self.level < self.quiet_below {
            "too quiet".to_string()
        } else {
            format!("{:.0}%", ratio * 100.0)
        };

        LineGauge::default()
            .block(Block::default().title(" Volume ").borders(Borders::ALL))
            .filled_style(Style::default().fg(color))
            .ratio(ratio)
            .label(label)
            .render(area, buf);
    }
}
