//! Background compositing CLI tool
//!
//! Command-line interface that runs one submission through the
//! `SubmissionProcessor` and writes the preview image.

use super::{config::CliConfigBuilder, notifier::SpinnerNotifier};
use crate::{
    config::OutputFormat,
    processor::{SubmissionProcessor, ViewState},
    services::ImageIOService,
    tracing_config::{init_cli_tracing, spans, TracingFormat},
    types::BackgroundMode,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Composite an image over a transparent, solid color or image background,
/// optionally removing its background with a remote prediction service first
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-bgcompose")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Remove the background with the prediction service before compositing
    #[arg(long)]
    pub remove_bg: bool,

    /// Background to put behind the image
    #[arg(long, value_enum, default_value_t = CliBackgroundOption::Transparent)]
    pub background_option: CliBackgroundOption,

    /// Background color as CSS hex (#rgb, #rrggbb, #rrggbbaa)
    #[arg(long, default_value = "#ffffff")]
    pub background_color: String,

    /// Background image used with `--background-option image`
    #[arg(long, value_name = "PATH")]
    pub background_file: Option<PathBuf>,

    /// Output file. Use "-" for stdout [default: <stem>-composited.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: from the output extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Print the result as a data URL instead of writing a file
    #[arg(long)]
    pub data_url: bool,

    /// Bearer token for the prediction service
    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Model version identifier sent with each prediction
    #[arg(long, env = "REPLICATE_MODEL_VERSION")]
    pub model_version: Option<String>,

    /// Base URL of the prediction service
    #[arg(long, env = "REPLICATE_API_BASE")]
    pub api_base: Option<String>,

    /// Delay between two status polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Maximum number of status polls
    #[arg(long, default_value_t = 120)]
    pub max_attempts: u32,

    /// Overall polling budget in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[cfg(feature = "tracing-json")]
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackgroundOption {
    Transparent,
    Color,
    Image,
}

impl From<CliBackgroundOption> for BackgroundMode {
    fn from(option: CliBackgroundOption) -> Self {
        match option {
            CliBackgroundOption::Transparent => BackgroundMode::Transparent,
            CliBackgroundOption::Color => BackgroundMode::Color,
            CliBackgroundOption::Image => BackgroundMode::Image,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, tracing_format(&cli))
        .context("Failed to initialize tracing")?;
    let span = spans::session(&session_id, &cli.input);
    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    let compose = CliConfigBuilder::compose_config(&cli);
    let submission = CliConfigBuilder::submission(&cli)?;

    let spinner = create_spinner(cli.verbose);
    let notifier = Arc::new(SpinnerNotifier::new(spinner.clone()));

    let builder = SubmissionProcessor::builder()
        .compose_config(compose)
        .notifier(notifier);
    let processor = match CliConfigBuilder::client_config(&cli)? {
        Some(client) => {
            info!(base_url = %client.base_url, "Background removal enabled");
            builder.build_with_client(client)
        },
        None => builder.build(),
    }
    .context("Failed to build processor")?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let mut view = ViewState::default();
    processor.submit(&submission, &mut view, &cancel).await;
    spinner.finish_and_clear();

    if let Some(error) = view.error {
        anyhow::bail!(error);
    }
    let preview = view
        .preview_image
        .context("Processing finished without a preview image")?;

    // The preview may be a remote URL when the service result is used as is
    let image = processor
        .loader()
        .load_cancellable("preview", &preview, &cancel)
        .await
        .context("Failed to load the rendered preview")?;

    if cli.data_url {
        let rendered = ImageIOService::to_rendered_output(&image, &compose)?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", rendered.data_url).context("Failed to write data URL to stdout")?;
        return Ok(());
    }

    let bytes = ImageIOService::encode(&image, compose.output_format, compose.jpeg_quality)?;
    match CliConfigBuilder::output_target(&cli, compose.output_format) {
        None => {
            let _span = spans::output("stdout", bytes.len()).entered();
            write_stdout(&bytes)?;
            debug!("Image written to stdout");
        },
        Some(path) => {
            let _span = spans::output(&path.display().to_string(), bytes.len()).entered();
            ImageIOService::write_bytes(&bytes, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Saved {}x{} {} to {}",
                image.width(),
                image.height(),
                compose.output_format,
                path.display()
            );
        },
    }

    Ok(())
}

fn tracing_format(cli: &Cli) -> TracingFormat {
    #[cfg(feature = "tracing-json")]
    if cli.json_logs {
        return TracingFormat::Json;
    }
    let _ = cli;
    TracingFormat::Console
}

/// Spinner shown while the submission is processed; hidden at high verbosity
fn create_spinner(verbose: u8) -> ProgressBar {
    if verbose >= 2 {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling submission");
            cancel.cancel();
        }
    });
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
