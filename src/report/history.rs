use console::style;

use crate::storage::records::{ChallengeOutcome, ChallengeRecord};
use crate::tui::widgets::timer::format_clock;

/// One history line without styling.
pub fn format_row(record: &ChallengeRecord) -> String {
    // RFC 3339 starts with "YYYY-MM-DDTHH:MM".
    let when = record
        .finished_at
        .get(..16)
        .unwrap_or(&record.finished_at)
        .replace('T', " ");
    format!(
        "{when:16}  oct {:<2} {:6}  {:>5} {:1}  {}/8  {:>7}  {}",
        record.octave,
        record.difficulty.as_str(),
        record.stats.total_score,
        record.stats.grade.as_str(),
        record.notes_reached,
        format_clock(record.duration_ms),
        record.outcome.as_str(),
    )
}

pub fn print_history(records: &[ChallengeRecord]) {
    if records.is_empty() {
        println!("No challenge runs recorded yet.");
        return;
    }

    println!("{}", style("Recent Challenges").bold());
    println!();
    for record in records {
        let row = format_row(record);
        match record.outcome {
            ChallengeOutcome::Complete => println!("  {}", style(row).green()),
            ChallengeOutcome::Abandoned => println!("  {}", style(row).dim()),
            _ => println!("  {row}"),
        }
    }
}
