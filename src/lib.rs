#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Background Compositing Library
//!
//! Replace the background of an image: optionally strip the original
//! background through a Replicate-compatible prediction API, then composite
//! the result over a transparent canvas, a solid color, or another image.
//!
//! ## Features
//!
//! - **Remote Background Removal**: job creation plus bounded polling with
//!   attempt and wall-clock budgets and cooperative cancellation
//! - **Local Compositing**: transparent, color and custom-image backgrounds,
//!   exported as data URLs (PNG by default, JPEG and WebP optional)
//! - **Explicit Workflow State**: every submission walks a tagged
//!   [`SubmissionState`] machine
//! - **Scoped Object URLs**: temporary `blob:` references are released on
//!   every exit path
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_bgcompose::{
//!     ClientConfig, Submission, SubmissionProcessor, UploadedFile, ViewState,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = SubmissionProcessor::builder()
//!     .build_with_client(ClientConfig::from_env()?)?;
//!
//! let photo = UploadedFile::new("photo.jpg", std::fs::read("photo.jpg")?);
//! let beach = UploadedFile::new("beach.jpg", std::fs::read("beach.jpg")?);
//! let submission = Submission::new(photo)
//!     .remove_background(true)
//!     .background_image(beach);
//!
//! let mut view = ViewState::default();
//! processor
//!     .submit(&submission, &mut view, &CancellationToken::new())
//!     .await;
//! if let Some(preview) = view.preview_image {
//!     println!("{} bytes of data URL", preview.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Library vs CLI Usage
//!
//! - **Library Usage**: all workflow pieces are available by default and never
//!   install a tracing subscriber
//! - **CLI Usage**: the `cli` feature adds `clap`, `indicatif` and
//!   `tracing-subscriber` for the `imgly-bgcompose` binary
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and spinner
//! - `webp-support` (default): WebP output encoding
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod data_url;
pub mod error;
pub mod form;
pub mod loader;
pub mod object_url;
pub mod prediction;
pub mod processor;
pub mod removal;
pub mod services;
pub mod test_utils;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use compositor::{centered_offset, Canvas, Compositor};
pub use config::{ClientConfig, ClientConfigBuilder, ComposeConfig, OutputFormat, PollPolicy};
pub use error::{BgComposeError, Result};
pub use form::{FormData, FormValue};
pub use loader::ImageLoader;
pub use object_url::{ObjectUrlGuard, ObjectUrlRegistry};
pub use prediction::{Prediction, PredictionApi, PredictionStatus, ReplicateClient};
pub use processor::{SubmissionProcessor, SubmissionProcessorBuilder, SubmissionState, ViewState};
pub use removal::BackgroundRemover;
pub use services::{
    ImageIOService, NoOpNotifier, Notification, NotificationLevel, Notifier, OutputFormatHandler,
    ProcessingStage, TracingNotifier,
};
pub use types::{
    BackgroundColor, BackgroundMode, ProcessingOutcome, RenderedOutput, Submission, UploadedFile,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Composite `image_bytes` locally over a transparent or color background
///
/// Convenience wrapper for callers that do not need the full workflow.
///
/// # Examples
/// ```rust,no_run
/// use imgly_bgcompose::{compose_bytes, BackgroundMode, BackgroundColor, ComposeConfig};
///
/// # fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let output = compose_bytes(
///     &upload,
///     BackgroundMode::Color,
///     &BackgroundColor::new("#336699"),
///     &ComposeConfig::default(),
/// )?;
/// assert!(output.data_url.starts_with("data:image/png;base64,"));
/// # Ok(())
/// # }
/// ```
pub fn compose_bytes(
    image_bytes: &[u8],
    mode: BackgroundMode,
    color: &BackgroundColor,
    config: &ComposeConfig,
) -> Result<RenderedOutput> {
    config.validate()?;
    let image = ImageIOService::load_from_bytes(image_bytes)?;
    Compositor::new(*config).compose_local(&image, mode, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn test_compose_bytes_keeps_dimensions() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(9, 7, Rgba([5, 6, 7, 255])));
        let bytes = ImageIOService::encode(&source, OutputFormat::Png, 90).unwrap();

        let output = compose_bytes(
            &bytes,
            BackgroundMode::Transparent,
            &BackgroundColor::default(),
            &ComposeConfig::default(),
        )
        .unwrap();
        assert_eq!((output.width, output.height), (9, 7));
        assert_eq!(output.format, OutputFormat::Png);
    }

    #[test]
    fn test_compose_bytes_rejects_garbage() {
        let err = compose_bytes(
            b"nope",
            BackgroundMode::Color,
            &BackgroundColor::default(),
            &ComposeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BgComposeError::ImageLoad(_)));
    }
}
