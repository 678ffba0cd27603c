//! Submission processor
//!
//! This module provides the `SubmissionProcessor` that drives one submission
//! from validation to a rendered preview. The workflow is modelled as an
//! explicit [`SubmissionState`] machine:
//!
//! ```text
//! Idle -> Validating -> (RemovingBackground | LocalCompositing)
//!      -> CustomBackgroundCompositing? -> Done | Error
//! ```
//!
//! Temporary object URLs created for the source and background uploads are
//! held by guards scoped to the run, so they are released on every exit path.

use crate::{
    compositor::Compositor,
    config::{ClientConfig, ComposeConfig},
    error::{BgComposeError, Result},
    loader::ImageLoader,
    object_url::{ObjectUrlGuard, ObjectUrlRegistry},
    removal::BackgroundRemover,
    services::{NoOpNotifier, Notifier, ProcessingStage},
    types::{ProcessingOutcome, Submission, UploadedFile},
};
use image::DynamicImage;
use instant::Instant;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

const NO_FILE_UPLOADED: &str = "No file uploaded";
const MSG_PROCESSING: &str = "Processing Image...";
const MSG_REMOVING: &str = "Removing background with Replicate AI...";
const MSG_SUCCESS: &str = "Image converted successfully!";
const MSG_FAILURE: &str = "Failed to process image";

/// State of a submission as it moves through the workflow
#[derive(Debug)]
pub enum SubmissionState {
    /// Nothing has happened yet
    Idle,
    /// Checking the submission for a usable file
    Validating,
    /// Waiting on the remote service to strip the background
    RemovingBackground,
    /// Drawing the decoded source onto a local canvas
    LocalCompositing { source: DynamicImage },
    /// Drawing the foreground over the user-supplied background image
    CustomBackgroundCompositing {
        foreground: String,
        background_removed: bool,
    },
    /// Finished successfully
    Done(ProcessingOutcome),
    /// Finished with an error
    Error(BgComposeError),
}

impl SubmissionState {
    /// Whether the workflow stops at this state
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }

    /// Short name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::RemovingBackground => "removing-background",
            Self::LocalCompositing { .. } => "local-compositing",
            Self::CustomBackgroundCompositing { .. } => "custom-background-compositing",
            Self::Done(_) => "done",
            Self::Error(_) => "error",
        }
    }
}

/// UI-facing state updated by [`SubmissionProcessor::submit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Image shown as the preview
    pub preview_image: Option<String>,
    /// Foreground result before custom background compositing
    pub foreground_image: Option<String>,
    /// Whether a result can be downloaded
    pub download_ready: bool,
    /// User-facing error message of the last submission
    pub error: Option<String>,
    /// Whether a submission is in flight
    pub pending: bool,
}

/// Per-run resources; dropping it releases the object URLs
struct Run<'a> {
    submission: &'a Submission,
    file: Option<&'a UploadedFile>,
    source_url: Option<ObjectUrlGuard>,
    background_url: Option<ObjectUrlGuard>,
}

/// Drives submissions through validation, removal and compositing
pub struct SubmissionProcessor {
    remover: Option<BackgroundRemover>,
    compositor: Compositor,
    loader: ImageLoader,
    registry: ObjectUrlRegistry,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for SubmissionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionProcessor")
            .field("remover", &self.remover)
            .field("compositor", &self.compositor)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SubmissionProcessor {
    /// Create a new processor builder
    #[must_use]
    pub fn builder() -> SubmissionProcessorBuilder {
        SubmissionProcessorBuilder::new()
    }

    /// Registry holding the temporary object URLs of in-flight submissions
    #[must_use]
    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Loader used to resolve source, background and foreground references
    #[must_use]
    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Process one submission and update `view` the way a form submit would.
    ///
    /// Validation failures only set `view.error`; every other failure also
    /// emits a failure notification. On success the preview, foreground and
    /// download flag are replaced and a success notification is emitted.
    pub async fn submit(
        &self,
        submission: &Submission,
        view: &mut ViewState,
        cancel: &CancellationToken,
    ) {
        view.error = None;
        view.pending = true;

        match self.process(submission, cancel).await {
            Ok(outcome) => {
                view.preview_image = Some(outcome.preview);
                view.foreground_image = Some(outcome.foreground);
                view.download_ready = true;
                self.notifier.success(MSG_SUCCESS);
            },
            Err(BgComposeError::Validation(message)) => {
                view.error = Some(message);
            },
            Err(e) => {
                warn!(error = %e, "Image processing error");
                view.error = Some(format!("Error processing image: {}", e));
                self.notifier.error(MSG_FAILURE);
            },
        }

        view.pending = false;
    }

    /// Run one submission through the state machine.
    ///
    /// # Errors
    /// - `Validation` if the file is missing or empty (no network calls happen)
    /// - `ImageLoad` if the source, background or foreground cannot be decoded
    /// - `Removal`, `Timeout` or `Cancelled` from background removal
    /// - `InvalidConfig` if removal is requested without a configured remover
    /// - Encoder failures while exporting the canvas
    pub async fn process(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome> {
        let span = info_span!(
            "submission",
            remove_bg = submission.remove_bg,
            background = %submission.background
        );
        self.run(submission, cancel).instrument(span).await
    }

    async fn run(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome> {
        let started = Instant::now();
        let mut run = Run {
            submission,
            file: None,
            source_url: None,
            background_url: None,
        };

        let mut state = SubmissionState::Idle;
        loop {
            let next = match self.step(state, &mut run, cancel).await {
                Ok(next) => next,
                Err(e) => SubmissionState::Error(e),
            };
            debug!(state = next.name(), "Submission state changed");

            match next {
                SubmissionState::Done(outcome) => {
                    self.notifier.report_stage(ProcessingStage::Completed);
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        background_removed = outcome.background_removed,
                        "Submission processed"
                    );
                    return Ok(outcome);
                },
                SubmissionState::Error(e) => return Err(e),
                other => state = other,
            }
        }
    }

    async fn step(
        &self,
        state: SubmissionState,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<SubmissionState> {
        match state {
            SubmissionState::Idle => Ok(SubmissionState::Validating),
            SubmissionState::Validating => self.validate_and_load(run, cancel).await,
            SubmissionState::RemovingBackground => {
                let file = run.file.ok_or_else(|| BgComposeError::validation(NO_FILE_UPLOADED))?;
                let remover = self.remover.as_ref().ok_or_else(|| {
                    BgComposeError::invalid_config("background removal requested but no API client is configured")
                })?;

                self.notifier.info(MSG_REMOVING);
                self.notifier.report_stage(ProcessingStage::BackgroundRemoval);
                let foreground = remover.remove_background(file, cancel).await?;
                Ok(self.after_foreground(run, foreground, true))
            },
            SubmissionState::LocalCompositing { source } => {
                self.notifier.report_stage(ProcessingStage::LocalCompositing);
                let rendered = self.compositor.compose_local(
                    &source,
                    run.submission.background,
                    &run.submission.background_color,
                )?;
                Ok(self.after_foreground(run, rendered.data_url, false))
            },
            SubmissionState::CustomBackgroundCompositing {
                foreground,
                background_removed,
            } => {
                self.compose_custom_background(run, foreground, background_removed, cancel)
                    .await
            },
            SubmissionState::Done(_) | SubmissionState::Error(_) => Err(BgComposeError::processing(
                format!("no transition out of terminal state '{}'", state.name()),
            )),
        }
    }

    async fn validate_and_load(
        &self,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<SubmissionState> {
        self.notifier.report_stage(ProcessingStage::Validating);
        let submission = run.submission;
        let file = submission
            .file
            .as_ref()
            .filter(|file| !file.is_empty())
            .ok_or_else(|| BgComposeError::validation(NO_FILE_UPLOADED))?;
        run.file = Some(file);

        self.notifier.success(MSG_PROCESSING);
        self.notifier.report_stage(ProcessingStage::ImageLoading);
        let guard = run
            .source_url
            .insert(self.registry.create_scoped(file.bytes.clone()));
        let source = self.loader.load_cancellable("source", guard.url(), cancel).await?;
        debug!(file = %file.name, width = source.width(), height = source.height(), "Source decoded");

        if submission.remove_bg {
            Ok(SubmissionState::RemovingBackground)
        } else {
            Ok(SubmissionState::LocalCompositing { source })
        }
    }

    fn after_foreground(
        &self,
        run: &Run<'_>,
        foreground: String,
        background_removed: bool,
    ) -> SubmissionState {
        if run.submission.custom_background().is_some() {
            SubmissionState::CustomBackgroundCompositing {
                foreground,
                background_removed,
            }
        } else {
            SubmissionState::Done(ProcessingOutcome {
                preview: foreground.clone(),
                foreground,
                background_removed,
            })
        }
    }

    async fn compose_custom_background(
        &self,
        run: &mut Run<'_>,
        foreground: String,
        background_removed: bool,
        cancel: &CancellationToken,
    ) -> Result<SubmissionState> {
        let submission = run.submission;
        let background_file = submission
            .custom_background()
            .ok_or_else(|| BgComposeError::processing("custom background file disappeared"))?;

        self.notifier.report_stage(ProcessingStage::BackgroundCompositing);
        let guard = run
            .background_url
            .insert(self.registry.create_scoped(background_file.bytes.clone()));
        let background = self
            .loader
            .load_cancellable("background", guard.url(), cancel)
            .await?;
        let foreground_image = self
            .loader
            .load_cancellable("foreground", &foreground, cancel)
            .await?;

        let rendered = self
            .compositor
            .compose_over_background(&background, &foreground_image)?;
        Ok(SubmissionState::Done(ProcessingOutcome {
            preview: rendered.data_url,
            foreground,
            background_removed,
        }))
    }
}

/// Builder for `SubmissionProcessor`
pub struct SubmissionProcessorBuilder {
    remover: Option<BackgroundRemover>,
    compose: ComposeConfig,
    registry: ObjectUrlRegistry,
    loader: Option<ImageLoader>,
    notifier: Arc<dyn Notifier>,
}

impl SubmissionProcessorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            remover: None,
            compose: ComposeConfig::default(),
            registry: ObjectUrlRegistry::new(),
            loader: None,
            notifier: Arc::new(NoOpNotifier),
        }
    }

    /// Use this remover for submissions with `remove_bg` set
    #[must_use]
    pub fn remover(mut self, remover: BackgroundRemover) -> Self {
        self.remover = Some(remover);
        self
    }

    #[must_use]
    pub fn compose_config(mut self, compose: ComposeConfig) -> Self {
        self.compose = compose;
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: ObjectUrlRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a custom loader; its registry replaces the builder's
    #[must_use]
    pub fn loader(mut self, loader: ImageLoader) -> Self {
        self.registry = loader.registry().clone();
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Build the processor with a remover talking HTTP to the configured service
    ///
    /// # Errors
    /// - Invalid client or compose configuration
    /// - Failed to create HTTP client
    pub fn build_with_client(self, config: ClientConfig) -> Result<SubmissionProcessor> {
        let remover = BackgroundRemover::from_config(config)?;
        self.remover(remover).build()
    }

    /// Build the processor
    ///
    /// # Errors
    /// - Invalid compose configuration
    /// - Failed to create the loader's HTTP client
    pub fn build(self) -> Result<SubmissionProcessor> {
        self.compose.validate()?;
        let loader = match self.loader {
            Some(loader) => loader,
            None => ImageLoader::new(self.registry.clone())?,
        };
        Ok(SubmissionProcessor {
            remover: self.remover,
            compositor: Compositor::new(self.compose),
            loader,
            registry: self.registry,
            notifier: self.notifier,
        })
    }
}

impl Default for SubmissionProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{OutputFormat, PollPolicy},
        data_url,
        services::{ImageIOService, NotificationLevel},
        test_utils::{prediction, RecordingNotifier, ScriptedPredictionApi},
    };
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::time::Duration;

    fn png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color));
        ImageIOService::encode(&image, OutputFormat::Png, 90).unwrap()
    }

    fn upload(name: &str, width: u32, height: u32) -> UploadedFile {
        UploadedFile::new(name, png(width, height, Rgba([200, 10, 10, 255])))
            .with_content_type("image/png")
    }

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: 5,
            timeout: Duration::from_secs(5),
        }
    }

    fn processor_with(
        api: Arc<ScriptedPredictionApi>,
        notifier: Arc<RecordingNotifier>,
    ) -> SubmissionProcessor {
        let remover = BackgroundRemover::new(api, "test-version", fast_poll()).unwrap();
        SubmissionProcessor::builder()
            .remover(remover)
            .notifier(notifier)
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SubmissionState::Idle.name(), "idle");
        assert!(!SubmissionState::RemovingBackground.is_terminal());
        assert!(SubmissionState::Error(BgComposeError::processing("x")).is_terminal());
    }

    #[tokio::test]
    async fn test_missing_file_is_validation_error_without_calls() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api.clone(), notifier.clone());

        let submission = Submission::default().remove_background(true);
        let err = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No file uploaded");

        let empty = Submission::new(UploadedFile::new("empty.png", Vec::new())).remove_background(true);
        let err = processor
            .process(&empty, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BgComposeError::Validation(_)));

        assert!(!api.was_called());
        assert_eq!(processor.registry().created_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_error_sets_view_error_without_toast() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api, notifier.clone());

        let mut view = ViewState {
            error: Some("stale".to_string()),
            ..ViewState::default()
        };
        processor
            .submit(&Submission::default(), &mut view, &CancellationToken::new())
            .await;

        assert_eq!(view.error.as_deref(), Some("No file uploaded"));
        assert!(!view.pending);
        assert!(!view.download_ready);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_local_path_never_calls_service() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api.clone(), notifier.clone());

        let submission = Submission::new(upload("photo.png", 12, 8)).color("#00ff00");
        let mut view = ViewState::default();
        processor
            .submit(&submission, &mut view, &CancellationToken::new())
            .await;

        assert!(!api.was_called());
        assert!(view.download_ready);
        assert!(view.error.is_none());
        assert_eq!(view.preview_image, view.foreground_image);
        assert_eq!(
            notifier.messages(),
            vec![
                (NotificationLevel::Success, MSG_PROCESSING.to_string()),
                (NotificationLevel::Success, MSG_SUCCESS.to_string()),
            ]
        );
        assert_eq!(processor.registry().live_count(), 0);
        assert_eq!(processor.registry().revoked_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_background_success() {
        let result = data_url::encode(&png(6, 4, Rgba([0, 0, 0, 0])), "image/png");
        let api = Arc::new(ScriptedPredictionApi::new(vec![
            prediction("processing", None),
            prediction("succeeded", Some(&result)),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api.clone(), notifier.clone());

        let submission = Submission::new(upload("photo.png", 6, 4)).remove_background(true);
        let outcome = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.background_removed);
        assert_eq!(outcome.foreground, result);
        assert_eq!(outcome.preview, result);
        assert_eq!(api.created_versions(), vec!["test-version".to_string()]);
        assert!(api.created_images()[0].starts_with("data:image/png;base64,"));
        assert_eq!(
            notifier.messages(),
            vec![
                (NotificationLevel::Success, MSG_PROCESSING.to_string()),
                (NotificationLevel::Info, MSG_REMOVING.to_string()),
            ]
        );
        assert_eq!(
            notifier.stages(),
            vec![
                ProcessingStage::Validating,
                ProcessingStage::ImageLoading,
                ProcessingStage::BackgroundRemoval,
                ProcessingStage::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_custom_background_is_composited() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api, notifier);

        let background = UploadedFile::new("bg.png", png(80, 60, Rgba([0, 0, 255, 255])));
        let submission = Submission::new(upload("photo.png", 40, 30)).background_image(background);
        let outcome = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap();

        assert_ne!(outcome.preview, outcome.foreground);
        let preview = image::load_from_memory(&data_url::decode(&outcome.preview).unwrap().bytes).unwrap();
        assert_eq!(preview.dimensions(), (80, 60));
        assert_eq!(preview.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(preview.get_pixel(20, 15), Rgba([200, 10, 10, 255]));
        assert_eq!(processor.registry().revoked_count(), 2);
        assert_eq!(processor.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_background_file_skips_compositing() {
        let processor = SubmissionProcessor::builder().build().unwrap();
        let submission = Submission::new(upload("photo.png", 4, 4))
            .background_image(UploadedFile::new("bg.png", Vec::new()));
        let outcome = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.preview, outcome.foreground);
        assert_eq!(processor.registry().created_count(), 1);
    }

    #[tokio::test]
    async fn test_object_urls_released_when_foreground_fails() {
        let broken = data_url::encode(b"definitely not an image", "image/png");
        let api = Arc::new(ScriptedPredictionApi::new(vec![prediction(
            "succeeded",
            Some(&broken),
        )]));
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = processor_with(api, notifier.clone());

        let background = UploadedFile::new("bg.png", png(10, 10, Rgba([1, 1, 1, 255])));
        let submission = Submission::new(upload("photo.png", 5, 5))
            .remove_background(true)
            .background_image(background);

        let mut view = ViewState {
            preview_image: Some("previous".to_string()),
            ..ViewState::default()
        };
        processor
            .submit(&submission, &mut view, &CancellationToken::new())
            .await;

        let error = view.error.unwrap();
        assert!(error.starts_with("Error processing image: Failed to load image: foreground image"));
        assert_eq!(view.preview_image.as_deref(), Some("previous"));
        assert!(!view.download_ready);
        assert_eq!(
            notifier.messages().last(),
            Some(&(NotificationLevel::Error, MSG_FAILURE.to_string()))
        );
        assert_eq!(processor.registry().created_count(), 2);
        assert_eq!(processor.registry().revoked_count(), 2);
        assert_eq!(processor.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_source_fails_before_removal() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let processor = processor_with(api.clone(), Arc::new(RecordingNotifier::new()));

        let submission =
            Submission::new(UploadedFile::new("notes.txt", b"hello".to_vec())).remove_background(true);
        let err = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BgComposeError::ImageLoad(_)));
        assert!(!api.was_called());
        assert_eq!(processor.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_removal_failure_is_generic_processing_error() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![prediction("failed", None)]));
        let processor = processor_with(api, Arc::new(RecordingNotifier::new()));

        let mut view = ViewState::default();
        let submission = Submission::new(upload("photo.png", 3, 3)).remove_background(true);
        processor
            .submit(&submission, &mut view, &CancellationToken::new())
            .await;

        assert_eq!(
            view.error.as_deref(),
            Some("Error processing image: Failed to process image with Replicate: Prediction failed: Prediction failed")
        );
    }

    #[tokio::test]
    async fn test_removal_without_remover_is_config_error() {
        let processor = SubmissionProcessor::builder().build().unwrap();
        let submission = Submission::new(upload("photo.png", 3, 3)).remove_background(true);
        let err = processor
            .process(&submission, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BgComposeError::InvalidConfig(_)));
        assert_eq!(processor.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_submission_releases_urls() {
        let api = Arc::new(ScriptedPredictionApi::new(vec![]));
        let processor = processor_with(api, Arc::new(RecordingNotifier::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let submission = Submission::new(upload("photo.png", 3, 3)).remove_background(true);
        let err = processor.process(&submission, &cancel).await.unwrap_err();

        assert!(matches!(err, BgComposeError::Cancelled(_)));
        assert_eq!(processor.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_stalled_foreground_download_honours_cancel() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let output = format!("http://{}/out.png", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let api = Arc::new(ScriptedPredictionApi::new(vec![prediction("succeeded", Some(&output))]));
        let processor = processor_with(api, Arc::new(RecordingNotifier::new()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let submission = Submission::new(upload("photo.png", 3, 3))
            .remove_background(true)
            .background_image(upload("bg.png", 6, 6));
        let err = tokio::time::timeout(Duration::from_secs(5), processor.process(&submission, &cancel))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, BgComposeError::Cancelled(_)), "got {:?}", err);
        assert_eq!(processor.registry().live_count(), 0);
    }
}
