use anyhow::Result;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use serde_json::Value;

use crate::audio::capture::LiveInput;
use crate::dsp::PitchEstimate;
use crate::game::{Clock, GameSession, Lifecycle, ScaleChallenge, ScoreBoard};
use crate::tui::event::{Action, AppEvent, EventHandler};
use crate::tui::widgets::feed::{Feed, FeedWidget};
use crate::tui::widgets::hold_meter::HoldMeterWidget;
use crate::tui::widgets::pitch_display::PitchDisplayWidget;
use crate::tui::widgets::scale_ladder::ScaleLadderWidget;
use crate::tui::widgets::timer::TimerWidget;
use crate::tui::widgets::volume_meter::VolumeMeterWidget;
use crate::tui::Tui;

use super::{last_progress, pump_estimate, FRAME};

/// How the challenge screen was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeExit {
    /// The run completed or failed and the result was shown.
    Finished,
    /// The user quit mid-run.
    Abandoned,
}

pub struct ChallengeView<'a> {
    pub challenge: &'a ScaleChallenge,
    pub score: &'a ScoreBoard,
    pub estimate: PitchEstimate,
    pub hold_progress: f32,
    pub now_ms: u64,
    pub feed: &'a [(Color, String)],
}

impl ChallengeView<'_> {
    /// Scale positions that ran out of attempts. The score board records
    /// exactly one entry per finished note, in scale order.
    fn missed(&self) -> Vec<usize> {
        self.score
            .notes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.success)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Run one challenge. `autosave` receives a checkpoint whenever one is due.
pub fn run<C: Clock>(
    terminal: &mut Tui,
    input: &LiveInput,
    session: &mut GameSession<C>,
    feed: &Feed,
    autosave: &mut dyn FnMut(&Value),
) -> Result<ChallengeExit> {
    let events = EventHandler::new(FRAME);
    let mut last_seq = 0;
    let mut hold_progress = 0.0;

    let resumed = session
        .challenge()
        .is_some_and(|c| c.lifecycle() == Lifecycle::Active);
    if resumed {
        session.start();
        feed.push(Color::Cyan, "Resumed saved run");
    } else {
        feed.push(Color::Cyan, "Press Enter to start");
    }

    loop {
        pump_estimate(input, session, &mut last_seq);
        let tick = session.tick();
        if let Some(p) = last_progress(&tick.events) {
            hold_progress = p.hold_progress;
        }
        if tick.autosave_due {
            if let Some(checkpoint) = session.checkpoint() {
                autosave(&checkpoint);
            }
        }
        if tick.finished {
            feed.push(Color::White, "Press Enter to see your results");
        }
        if input.has_failed() {
            anyhow::bail!("pitch detection stopped unexpectedly");
        }

        let now = session.now_ms();
        let estimate = session.current_estimate(now);
        let lines = feed.lines();
        if let Some(challenge) = session.challenge() {
            let view = ChallengeView {
                challenge,
                score: session.score(),
                estimate,
                hold_progress,
                now_ms: now,
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
        let lifecycle = session.challenge().map(|c| c.lifecycle());
        match (Action::from_key(&key), lifecycle) {
            (Some(Action::Confirm), Some(Lifecycle::Ready)) => {
                session.start();
                hold_progress = 0.0;
                feed.push(Color::Cyan, "Go!");
            }
            (Some(Action::Confirm | Action::Quit), Some(Lifecycle::Complete | Lifecycle::Failed(_))) => {
                return Ok(ChallengeExit::Finished);
            }
            (Some(Action::Quit), _) => return Ok(ChallengeExit::Abandoned),
            _ => {}
        }
    }
}

pub fn render(frame: &mut Frame, area: Rect, view: &ChallengeView) {
    let challenge = view.challenge;
    let config = challenge.config();
    let settings = challenge.settings();

    let outer = Block::default()
        .title(format!(" Scale Challenge · octave {} · {} ", config.octave, config.difficulty))
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::White));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(5),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(inner);

    frame.render_widget(
        ScaleLadderWidget::new(challenge.scale_notes(), challenge.current_note_index(), &view.missed()),
        rows[0],
    );

    let top = Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)]).split(rows[1]);
    match challenge.current_note() {
        Some(target) => frame.render_widget(
            PitchDisplayWidget::new(view.estimate.frequency, target, settings.tolerance_cents),
            top[0],
        ),
        None => frame.render_widget(
            Paragraph::new(" Scale finished").block(Block::default().borders(Borders::ALL)),
            top[0],
        ),
    }
    frame.render_widget(TimerWidget::countdown(challenge.remaining_ms(view.now_ms)), top[1]);

    frame.render_widget(HoldMeterWidget::new(view.hold_progress, settings.hold_time_ms), rows[2]);
    frame.render_widget(VolumeMeterWidget::new(view.estimate.volume), rows[3]);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let status = Line::from(vec![
        Span::styled(" Score ", bold),
        Span::raw(view.score.total_score.to_string()),
        Span::styled("   Combo ", bold),
        Span::raw(view.score.current_combo.to_string()),
        Span::styled("   Attempt ", bold),
        Span::raw(format!(
            "{}/{}",
            (challenge.current_note_attempts() + 1).min(settings.max_attempts_per_note),
            settings.max_attempts_per_note
        )),
        Span::styled("   Misses ", bold),
        Span::raw(format!("{}/{}", challenge.failure_count(), crate::game::challenge::MAX_FAILURES)),
    ]);
    frame.render_widget(Paragraph::new(status).block(Block::default().borders(Borders::ALL)), rows[4]);

    frame.render_widget(FeedWidget::new(view.feed), rows[5]);

    let hint = match challenge.lifecycle() {
        Lifecycle::Ready => "  [Enter] start  [q] quit",
        Lifecycle::Active => "  [q] abandon",
        Lifecycle::Complete | Lifecycle::Failed(_) => "  [Enter] results",
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::Green))),
        rows[6],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ChallengeConfig, Difficulty};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen_text(view: &ChallengeView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 28)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                render(frame, area, view)
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn ready_screen_prompts_to_start() {
        let challenge = ScaleChallenge::new(ChallengeConfig {
            octave: 3,
            difficulty: Difficulty::Hard,
        })
        .unwrap();
        let score = ScoreBoard::new();
        let view = ChallengeView {
            challenge: &challenge,
            score: &score,
            estimate: PitchEstimate::unvoiced(0.0),
            hold_progress: 0.0,
            now_ms: 0,
            feed: &[],
        };
        let text = screen_text(&view);
        assert!(text.contains("octave 3"));
        assert!(text.contains("Target C3"));
        assert!(text.contains("2:00.0"));
        assert!(text.contains("[Enter] start"));
    }

    #[test]
    fn missed_notes_follow_score_order() {
        let challenge = ScaleChallenge::new(ChallengeConfig::default()).unwrap();
        let mut score = ScoreBoard::new();
        score.add_note(3.0, 1000, true);
        score.add_note(0.0, 9000, false);
        score.add_note(12.0, 2500, true);
        let view = ChallengeView {
            challenge: &challenge,
            score: &score,
            estimate: PitchEstimate::unvoiced(0.0),
            hold_progress: 0.0,
            now_ms: 0,
            feed: &[],
        };
        assert_eq!(view.missed(), vec![1]);
    }
}
