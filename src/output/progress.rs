//! Live scan progress on stderr.

use crate::report::ProgressEvent;
use crate::services::service_label;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar fed by aggregator events.
pub struct ScanProgress {
    bar: ProgressBar,
}

impl ScanProgress {
    /// Create a bar for `total` jobs. A hidden bar still reports open ports.
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        Self { bar }
    }

    /// Apply one event to the display.
    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Completed { completed, .. } => self.bar.set_position(completed as u64),
            ProgressEvent::OpenPort(result) => {
                let line = format!(
                    "{} {} {} open ({})",
                    style("[+]").green().bold(),
                    result.protocol,
                    style(result.port).bold(),
                    service_label(result.protocol, result.port.as_u16())
                );
                if self.bar.is_hidden() {
                    eprintln!("{}", line);
                } else {
                    self.bar.println(line);
                }
                self.bar.set_message(format!("last open: {}/{}", result.port, result.protocol));
            }
        }
    }

    /// Stop the bar with a closing message.
    pub fn finish(&self, cancelled: bool) {
        if cancelled {
            self.bar.abandon_with_message("cancelled");
        } else {
            self.bar.finish_with_message("done");
        }
    }
}
