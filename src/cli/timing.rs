//! Timing subcommand implementation.
//!
//! Handles the `portsweep timing` command, which prints the built-in profiles.

use crate::config::TimingProfile;
use crate::error::CliResult;
use clap::Parser;

/// List the built-in timing profiles.
#[derive(Parser, Debug)]
pub struct TimingCommand {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl TimingCommand {
    /// Execute the timing command.
    pub fn execute(&self, quiet: bool) -> CliResult<()> {
        let profiles: Vec<TimingProfile> = TimingProfile::all().collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&profiles)?);
            return Ok(());
        }

        if !quiet {
            println!(
                "\n{:<6} {:<12} {:>10} {:>8} {:>10}",
                "LEVEL", "NAME", "TIMEOUT", "WORKERS", "DELAY"
            );
            println!("{}", "-".repeat(50));
        }

        for profile in profiles {
            println!(
                "{:<6} {:<12} {:>8}ms {:>8} {:>8}ms",
                format!("T{}", profile.level),
                profile.name(),
                profile.timeout.as_millis(),
                profile.max_workers,
                profile.inter_probe_delay.as_millis()
            );
        }

        if !quiet {
            println!();
        }

        Ok(())
    }
}
