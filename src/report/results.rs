use console::style;

use crate::calibration::CalibrationResult;
use crate::game::{Grade, PracticeStats};
use crate::storage::records::{ChallengeOutcome, ChallengeRecord};
use crate::tui::widgets::timer::format_clock;

/// Signed difference against a previous best, or None when there is nothing
/// to compare or the scores are equal.
pub fn best_delta(total: u32, previous_best: Option<u32>) -> Option<i64> {
    let best = previous_best?;
    let delta = total as i64 - best as i64;
    (delta != 0).then_some(delta)
}

fn grade_style(grade: Grade) -> console::StyledObject<&'static str> {
    let label = grade.as_str();
    match grade {
        Grade::S | Grade::A => style(label).green().bold(),
        Grade::B | Grade::C => style(label).yellow().bold(),
        Grade::D | Grade::F => style(label).red().bold(),
    }
}

pub fn outcome_label(outcome: ChallengeOutcome) -> &'static str {
    match outcome {
        ChallengeOutcome::Complete => "Scale complete",
        ChallengeOutcome::TimeLimitExceeded => "Out of time",
        ChallengeOutcome::TooManyFailures => "Too many missed notes",
        ChallengeOutcome::Abandoned => "Abandoned",
    }
}

/// Print the end-of-run summary for a challenge.
pub fn print_challenge_summary(record: &ChallengeRecord, previous_best: Option<u32>) {
    let stats = &record.stats;

    println!();
    println!("{}", style("=== Challenge Results ===").bold());
    println!();
    let outcome = outcome_label(record.outcome);
    let outcome = if record.outcome == ChallengeOutcome::Complete {
        style(outcome).green().bold()
    } else {
        style(outcome).red().bold()
    };
    println!("  {outcome}");
    println!();

    println!("  {:12} {:>8}   {}", style("Score").bold(), stats.total_score, grade_style(stats.grade));
    if let Some(delta) = best_delta(stats.total_score, previous_best) {
        let text = format!("{delta:+} vs best");
        let text = if delta > 0 {
            style(text).green()
        } else {
            style(text).red()
        };
        println!("  {:12} {:>8}", "", text);
    }
    println!("  {:12} {:>8}", style("Notes").bold(), format!("{}/8", record.notes_reached));
    println!("  {:12} {:>8}", style("Accuracy").bold(), format!("{:.0}%", stats.accuracy_percent));
    if let Some(avg) = stats.average_cents {
        println!("  {:12} {:>8}", style("Avg offset").bold(), format!("{avg:.1}¢"));
    }
    println!("  {:12} {:>8}", style("Max combo").bold(), stats.max_combo);
    println!("  {:12} {:>8}", style("Time").bold(), format_clock(record.duration_ms));
    println!(
        "  {:12} {} perfect  {} great  {} ok  {} miss",
        style("Tiers").bold(),
        style(stats.perfect).green(),
        style(stats.great).cyan(),
        style(stats.ok).yellow(),
        style(stats.miss).red()
    );
    println!();
}

pub fn print_practice_summary(target: &str, stats: &PracticeStats) {
    println!();
    println!("{}", style("=== Practice ===").bold());
    println!();
    println!("  {:12} {:>8}", style("Last note").bold(), target);
    println!("  {:12} {:>8}", style("Held").bold(), format!("{}/{}", stats.successes, stats.attempts));
    println!("  {:12} {:>8}", style("Success").bold(), format!("{:.0}%", stats.success_rate() * 100.0));
    if let Some(best) = stats.best_accuracy_cents {
        println!("  {:12} {:>8}", style("Best").bold(), format!("{best:.1}¢"));
    }
    println!(
        "  {:12} {:>8}",
        style("Hold time").bold(),
        format!("{:.1}s", stats.total_hold_time_ms as f32 / 1000.0)
    );
    println!();
}

pub fn print_calibration(result: &CalibrationResult) {
    println!();
    println!("{}", style("=== Calibration ===").bold());
    println!();
    println!(
        "  {:12} {} - {}",
        style("Range").bold(),
        style(&result.lowest_note).cyan(),
        style(&result.highest_note).cyan()
    );
    println!("  {:12} {}", style("Voice").bold(), style(result.voice_type).green().bold());
    println!("  {:12} {}", style("Octave").bold(), result.recommended_octave);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_against_best() {
        assert_eq!(best_delta(500, None), None);
        assert_eq!(best_delta(500, Some(500)), None);
        assert_eq!(best_delta(620, Some(500)), Some(120));
        assert_eq!(best_delta(400, Some(500)), Some(-100));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label(ChallengeOutcome::TooManyFailures), "Too many missed notes");
    }
}
