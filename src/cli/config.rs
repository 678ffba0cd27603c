//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::Cli;
use crate::{
    config::{ClientConfig, ComposeConfig, OutputFormat},
    form::{fields, FormData},
    services::{ImageIOService, OutputFormatHandler},
    types::{BackgroundMode, Submission, UploadedFile},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Converts CLI arguments into submissions and configurations
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Check argument combinations clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !ImageIOService::is_supported_format(&cli.input) {
            tracing::warn!(
                input = %cli.input.display(),
                "Unrecognized input extension, relying on content sniffing"
            );
        }

        if cli.background_file.is_some() && BackgroundMode::from(cli.background_option) != BackgroundMode::Image {
            tracing::warn!("--background-file is ignored unless --background-option is image");
        }

        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be between 0 and 100, got {}", cli.jpeg_quality);
        }

        if cli.remove_bg && cli.api_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            anyhow::bail!(
                "--remove-bg needs an API token: pass --api-token or set {}",
                crate::config::API_TOKEN_ENV
            );
        }

        Ok(())
    }

    /// Output format from `--format`, else the output extension, else PNG
    pub(crate) fn output_format(cli: &Cli) -> OutputFormat {
        if let Some(format) = cli.format {
            return format.into();
        }
        cli.output
            .as_deref()
            .filter(|output| *output != "-")
            .and_then(|output| Path::new(output).extension())
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormatHandler::from_extension)
            .unwrap_or_default()
    }

    pub(crate) fn compose_config(cli: &Cli) -> ComposeConfig {
        ComposeConfig {
            output_format: Self::output_format(cli),
            jpeg_quality: cli.jpeg_quality,
        }
    }

    /// Client configuration, present only when background removal is requested
    pub(crate) fn client_config(cli: &Cli) -> Result<Option<ClientConfig>> {
        if !cli.remove_bg {
            return Ok(None);
        }

        let mut builder = ClientConfig::builder(cli.api_token.clone().unwrap_or_default())
            .poll_interval(Duration::from_millis(cli.poll_interval_ms))
            .max_attempts(cli.max_attempts)
            .timeout(Duration::from_secs(cli.timeout_secs));
        if let Some(base) = &cli.api_base {
            builder = builder.base_url(base.clone());
        }
        if let Some(version) = &cli.model_version {
            builder = builder.model_version(version.clone());
        }

        builder
            .build()
            .map(Some)
            .context("Invalid prediction service configuration")
    }

    /// Read the input files and assemble the submission the same way a form post would
    pub(crate) fn submission(cli: &Cli) -> Result<Submission> {
        let mut form = FormData::new()
            .with_file(fields::FILE, read_upload(&cli.input)?)
            .with_text(fields::BACKGROUND_OPTION, BackgroundMode::from(cli.background_option).to_string())
            .with_text(fields::BACKGROUND_COLOR, cli.background_color.clone());
        if cli.remove_bg {
            form.append_text(fields::REMOVE_BG, "on");
        }
        if let Some(path) = &cli.background_file {
            form.append_file(fields::BACKGROUND_FILE, read_upload(path)?);
        }
        Ok(Submission::from_form(form))
    }

    /// Where to write the output; `None` means stdout
    pub(crate) fn output_target(cli: &Cli, format: OutputFormat) -> Option<PathBuf> {
        match cli.output.as_deref() {
            Some("-") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(default_output_path(&cli.input, format)),
        }
    }
}

/// Load a file from disk as an upload
fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let upload = UploadedFile::new(name, bytes);
    Ok(match image::ImageFormat::from_path(path) {
        Ok(format) => upload.with_content_type(format.to_mime_type()),
        Err(_) => upload,
    })
}

/// `<dir>/<stem>-composited.<ext>` next to the input
fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let dir = input.parent().unwrap_or(Path::new(""));
    dir.join(format!(
        "{}-composited.{}",
        stem,
        OutputFormatHandler::get_extension(format)
    ))
}
