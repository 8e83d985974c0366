use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::audio::capture::LiveInput;
use crate::audio::prompt::{self, Ready};
use crate::calibration::{self, CalibrationEngine, CalibrationError, CalibrationResult};
use crate::config::AppConfig;
use crate::report::results;
use crate::storage::records::CalibrationRecord;
use crate::storage::store;

/// Measure the singer's range and store the recommended octave.
///
/// Returns None when the user backs out before or during the test.
pub fn run_calibration(config: &AppConfig) -> Result<Option<CalibrationResult>> {
    println!();
    println!("{}", style("=== Voice Calibration ===").bold());
    println!();
    println!("  First hum steadily for a few seconds so the level can be checked.");
    println!("  Then glide slowly from your lowest comfortable note to your highest.");
    println!();
    println!(
        "  Press {} when ready, {} to cancel.",
        style("Enter").green().bold(),
        style("Esc").red().bold()
    );

    if prompt::wait_for_enter()? == Ready::Cancel {
        return Ok(None);
    }

    let input = LiveInput::start(&config.detector)?;
    println!();
    println!("  Listening on {}", style(input.device_name()).cyan().bold());
    println!();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("  {bar:30.green/dim} {pos:>3}%  {msg}")
            .context("Invalid progress template")?,
    );

    let (handle, mut token) = calibration::cancel_pair();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let mut engine = CalibrationEngine::new(input);
    let outcome = rt.block_on(engine.run(&mut token, |progress| {
        pb.set_position((progress.overall * 100.0).round() as u64);
        pb.set_message(progress.message.clone());
    }));
    if let (Some(low), Some(high)) = (
        engine.range_samples().iter().min_by_key(|s| s.midi),
        engine.range_samples().iter().max_by_key(|s| s.midi),
    ) {
        tracing::debug!(
            samples = engine.range_samples().len(),
            low = %low.note,
            low_hz = low.frequency,
            high = %high.note,
            high_hz = high.frequency,
            "range samples"
        );
    }

    match outcome {
        Ok(result) => {
            pb.finish_and_clear();
            results::print_calibration(&result);
            store::save_calibration(&CalibrationRecord::now(result.clone()))?;
            println!(
                "  Saved. {} will now start in octave {}.",
                style("challenge").cyan(),
                result.recommended_octave
            );
            println!();
            Ok(Some(result))
        }
        Err(CalibrationError::Cancelled) => {
            pb.abandon_with_message("cancelled");
            println!();
            Ok(None)
        }
        Err(e) => {
            pb.abandon();
            println!();
            let code = e.code();
            Err(anyhow::Error::new(e).context(format!("Calibration failed ({code})")))
        }
    }
}
