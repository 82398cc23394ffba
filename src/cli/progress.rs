//! CLI-specific progress handling for tripfare
//!
//! Shows a spinner on stderr while providers are being queried.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Creates a spinner for CLI display
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Failed to create progress style")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Spinner shown for the duration of one provider call
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Start spinning with `message`
    pub fn new(message: &str) -> Self {
        let pb = create_spinner(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Stop and erase the spinner so only command output remains
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
