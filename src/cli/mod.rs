//! CLI module for the imgly-bgcompose library
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;
mod notifier;

pub use main_impl::{main, Cli, CliBackgroundOption, CliOutputFormat};
pub use notifier::SpinnerNotifier;
