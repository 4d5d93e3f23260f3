//! User-facing progress and notices, injected into every command.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub trait Reporter {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    /// Start tracking a transfer. `total_bytes` is `None` when the server did
    /// not declare a content length.
    fn begin_transfer(&self, name: &str, total_bytes: Option<u64>) -> Box<dyn TransferProgress>;
}

pub trait TransferProgress {
    fn advance(&self, bytes: u64);
    fn finish(&self);
}

/// Logs through `tracing` and draws transfers with `indicatif` on stderr.
pub struct ConsoleReporter {
    show_progress: bool,
}

impl ConsoleReporter {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn begin_transfer(&self, name: &str, total_bytes: Option<u64>) -> Box<dyn TransferProgress> {
        let pb = match total_bytes {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{msg} {spinner:.green} [{elapsed_precise}] {bytes}")
                {
                    pb.set_style(style);
                }
                pb
            }
        };

        if !self.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_message(format!("Downloading {}", name));
        Box::new(BarProgress { pb })
    }
}

struct BarProgress {
    pb: ProgressBar,
}

impl TransferProgress for BarProgress {
    fn advance(&self, bytes: u64) {
        self.pb.inc(bytes);
    }

    fn finish(&self) {
        self.pb.finish_with_message("Download complete");
    }
}
