use anyhow::{Context, Result};
use console::style;
use cpal::traits::{DeviceTrait, HostTrait};

/// Print the input devices the game can listen on, marking the one it will use.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();

    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let devices: Vec<_> = host
        .input_devices()
        .context("Failed to enumerate input devices")?
        .collect();

    if devices.is_empty() {
        eprintln!("No microphones found. Plug one in and try again.");
        return Ok(());
    }

    println!("{} ({})", style("Microphones").bold(), host.id().name());
    println!();

    for device in &devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".into());
        if name == default_name {
            println!("  {} {}", style("*").green().bold(), style(&name).green().bold());
        } else {
            println!("    {}", style(&name).bold());
        }

        match device.default_input_config() {
            Ok(cfg) => {
                let rate = cfg.sample_rate().0;
                let note = if rate < 16_000 {
                    style(" (too low for pitch tracking)").red().to_string()
                } else {
                    String::new()
                };
                println!(
                    "      {}ch  {rate} Hz  {:?}{note}",
                    cfg.channels(),
                    cfg.sample_format()
                );
            }
            Err(e) => println!("      {}", style(format!("unusable: {e}")).dim()),
        }
    }

    if !default_name.is_empty() {
        println!();
        println!("  {} = the device the game listens on", style("*").green().bold());
    }

    Ok(())
}
