use anyhow::Result;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::audio::capture::LiveInput;
use crate::dsp::PitchEstimate;
use crate::game::{Clock, GameSession, PracticeMode};
use crate::notes;
use crate::tui::event::{Action, AppEvent, EventHandler};
use crate::tui::widgets::feed::{Feed, FeedWidget};
use crate::tui::widgets::hold_meter::HoldMeterWidget;
use crate::tui::widgets::pitch_display::PitchDisplayWidget;
use crate::tui::widgets::timer::TimerWidget;
use crate::tui::widgets::volume_meter::VolumeMeterWidget;
use crate::tui::Tui;

use super::{last_progress, pump_estimate, FRAME};

/// Everything the practice screen draws in one frame.
pub struct PracticeView<'a> {
    pub practice: &'a PracticeMode,
    pub estimate: PitchEstimate,
    pub hold_progress: f32,
    pub elapsed_ms: u64,
    pub feed: &'a [(Color, String)],
}

/// Free practice on one note until the user quits.
pub fn run<C: Clock>(
    terminal: &mut Tui,
    input: &LiveInput,
    session: &mut GameSession<C>,
    feed: &Feed,
) -> Result<()> {
    let events = EventHandler::new(FRAME);
    let mut last_seq = 0;
    let mut hold_progress = 0.0;
    session.start();
    let started = session.now_ms();

    loop {
        pump_estimate(input, session, &mut last_seq);
        let tick = session.tick();
        if let Some(p) = last_progress(&tick.events) {
            hold_progress = p.hold_progress;
        }
        if input.has_failed() {
            anyhow::bail!("pitch detection stopped unexpectedly");
        }

        let now = session.now_ms();
        let estimate = session.current_estimate(now);
        let lines = feed.lines();
        if let Some(practice) = session.practice_mode() {
            let view = PracticeView {
                practice,
                estimate,
                hold_progress,
                elapsed_ms: now.saturating_sub(started),
                feed: &lines,
            };
            terminal.draw(|frame| {
                let area = frame.area();
                render(frame, area, &view)
            })?;
        }

        let AppEvent::Key(key) = events.next()? else {
            continue;
        };
        let step = match Action::from_key(&key) {
            Some(Action::Quit) => break,
            Some(Action::Up) => 1,
            Some(Action::Down) => -1,
            Some(Action::OctaveUp) => 12,
            Some(Action::OctaveDown) => -12,
            _ => continue,
        };
        if let Some(practice) = session.practice_mode_mut() {
            // Out-of-range moves just leave the target where it is.
            if let Ok(next) = notes::transpose(practice.target_note(), step) {
                practice.set_target(&next)?;
                hold_progress = 0.0;
                feed.push(Color::Cyan, format!("Target: {next}"));
            }
        }
    }

    Ok(())
}

pub fn render(frame: &mut Frame, area: Rect, view: &PracticeView) {
    let outer = Block::default()
        .title(" Practice ")
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let rows = Layout::vertical([
        Constraint::Length(5),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(inner);

    let config = view.practice.config();
    let top = Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)]).split(rows[0]);
    frame.render_widget(
        PitchDisplayWidget::new(view.estimate.frequency, &config.target_note, config.tolerance_cents),
        top[0],
    );
    frame.render_widget(TimerWidget::elapsed(view.elapsed_ms), top[1]);

    frame.render_widget(HoldMeterWidget::new(view.hold_progress, config.hold_time_ms), rows[1]);
    frame.render_widget(VolumeMeterWidget::new(view.estimate.volume), rows[2]);

    let stats = view.practice.stats();
    let best = stats
        .best_accuracy_cents
        .map_or_else(|| "--".to_string(), |c| format!("{c:.1}¢"));
    let summary = Line::from(vec![
        Span::styled(" Held ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{}/{}", stats.successes, stats.attempts)),
        Span::styled("   Success ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("{:.0}%", stats.success_rate() * 100.0)),
        Span::styled("   Best ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(best),
    ]);
    frame.render_widget(
        Paragraph::new(summary).block(Block::default().title(" Stats ").borders(Borders::ALL)),
        rows[3],
    );

    frame.render_widget(FeedWidget::new(view.feed), rows[4]);

    let hint = Paragraph::new(Line::from(vec![
        Span::styled("  [↑/↓]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" semitone  "),
        Span::styled("[+/-]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" octave  "),
        Span::styled("[q]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]));
    frame.render_widget(hint, rows[5]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PracticeConfig;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    #[test]
    fn renders_target_and_stats() {
        let practice = PracticeMode::new(PracticeConfig {
            target_note: "A4".into(),
            ..PracticeConfig::default()
        })
        .unwrap();
        let feed = vec![(Color::Green, "A4 held".to_string())];
        let view = PracticeView {
            practice: &practice,
            estimate: PitchEstimate {
                frequency: Some(440.0),
                confidence: 0.95,
                clarity: 0.95,
                volume: 0.4,
            },
            hold_progress: 0.5,
            elapsed_ms: 12_000,
            feed: &feed,
        };

        let mut terminal = Terminal::new(TestBackend::new(60, 24)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render(frame, area, &view)
            })
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Target A4"));
        assert!(text.contains("0:12.0"));
        assert!(text.contains("A4 held"));
    }
}
