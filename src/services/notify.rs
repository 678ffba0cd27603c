//! User-facing notification service
//!
//! This module separates notification concerns (toasts in a UI, log lines
//! in a CLI) from the submission workflow, allowing different frontends to
//! implement their own presentation.

use chrono::{DateTime, Utc};

/// Stages of a submission, reported as it advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Checking the submission for a usable file
    Validating,
    /// Decoding the uploaded image
    ImageLoading,
    /// Waiting on the remote prediction service
    BackgroundRemoval,
    /// Drawing the upload onto a local canvas
    LocalCompositing,
    /// Drawing the result over the user-supplied background
    BackgroundCompositing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Validating => "Validating submission",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::BackgroundRemoval => "Removing background",
            ProcessingStage::LocalCompositing => "Compositing image",
            ProcessingStage::BackgroundCompositing => "Compositing over custom background",
            ProcessingStage::Completed => "Processing completed",
        }
    }
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A single notification as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new<S: Into<String>>(level: NotificationLevel, message: S) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Trait for surfacing notifications to the user
pub trait Notifier: Send + Sync {
    /// Deliver a notification
    fn notify(&self, notification: Notification);

    fn info(&self, message: &str) {
        self.notify(Notification::new(NotificationLevel::Info, message));
    }

    fn success(&self, message: &str) {
        self.notify(Notification::new(NotificationLevel::Success, message));
    }

    fn error(&self, message: &str) {
        self.notify(Notification::new(NotificationLevel::Error, message));
    }

    /// Report that the submission entered a stage
    fn report_stage(&self, stage: ProcessingStage) {
        // Only verbose frontends care about stages
        drop(stage);
    }
}

/// Notifier that discards everything
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Notifier that forwards to `tracing`
pub struct TracingNotifier {
    verbose: bool,
}

impl TracingNotifier {
    /// Create a new tracing notifier
    ///
    /// # Arguments
    /// * `verbose` - Whether to log stage transitions as well
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => tracing::info!("{}", notification.message),
            NotificationLevel::Success => tracing::info!("✅ {}", notification.message),
            NotificationLevel::Error => tracing::error!("❌ {}", notification.message),
        }
    }

    fn report_stage(&self, stage: ProcessingStage) {
        if self.verbose {
            tracing::debug!(stage = ?stage, "{}", stage.description());
        }
    }
}
