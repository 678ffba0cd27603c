//! Services separating I/O, format and notification concerns from the workflow

pub mod format;
pub mod io;
pub mod notify;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use notify::{
    NoOpNotifier, Notification, NotificationLevel, Notifier, ProcessingStage, TracingNotifier,
};
