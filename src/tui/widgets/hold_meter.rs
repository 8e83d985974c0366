use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Gauge, Widget};

/// How far through the required hold the singer is.
pub struct HoldMeterWidget {
    progress: f32,
    hold_time_ms: u64,
}

impl HoldMeterWidget {
    pub fn new(progress: f32, hold_time_ms: u64) -> Self {
        Self {
            progress,
            hold_time_ms,
        }
    }
}

impl Widget for HoldMeterWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let ratio = self.progress.clamp(0.0, 1.0) as f64;
        let held = (ratio * self.hold_time_ms as f64 / 1000.0) as f32;
        let target = self.hold_time_ms as f32 / 1000.0;
        let color = if ratio >= 1.0 { Color::Green } else { Color::Cyan };

        Gauge::default()
            .block(Block::default().title(" Hold ").borders(Borders::ALL))
            .gauge_style(Style::default().fg(color))
            .ratio(ratio)
            .label(format!("{held:.1}s / {target:.1}s"))
            .render(area, buf);
    }
}
