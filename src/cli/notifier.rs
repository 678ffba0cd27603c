//! Spinner-backed notifier for the command line

use crate::services::{Notification, NotificationLevel, Notifier, ProcessingStage};
use indicatif::ProgressBar;

/// Shows notifications on the spinner line and mirrors them to `tracing`
pub struct SpinnerNotifier {
    spinner: ProgressBar,
}

impl SpinnerNotifier {
    #[must_use]
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl Notifier for SpinnerNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(message = %notification.message, "Notification");
                self.spinner.set_message(notification.message);
            },
            NotificationLevel::Error => {
                tracing::error!(message = %notification.message, "Notification");
                self.spinner.println(format!("error: {}", notification.message));
            },
        }
    }

    fn report_stage(&self, stage: ProcessingStage) {
        tracing::debug!(stage = ?stage, "{}", stage.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_update_spinner() {
        let spinner = ProgressBar::hidden();
        let notifier = SpinnerNotifier::new(spinner.clone());

        notifier.info("Removing background with Replicate AI...");
        assert_eq!(spinner.message(), "Removing background with Replicate AI...");

        notifier.error("Failed to process image");
        assert_eq!(spinner.message(), "Removing background with Replicate AI...");
    }
}
