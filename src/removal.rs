//! Background removal through the remote prediction service
//!
//! A job is created with the image inlined as a data URL, then polled at a
//! fixed interval until it reaches a terminal status. Polling is bounded by
//! the attempt and wall-clock budget of [`PollPolicy`] and stops as soon as
//! the caller's [`CancellationToken`] fires.

use crate::{
    config::{ClientConfig, PollPolicy},
    data_url,
    error::{BgComposeError, Result},
    prediction::{Prediction, PredictionApi, PredictionStatus, ReplicateClient},
    types::UploadedFile,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Client that turns an image into a background-free result reference
#[derive(Clone)]
pub struct BackgroundRemover {
    api: Arc<dyn PredictionApi>,
    model_version: String,
    poll: PollPolicy,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("model_version", &self.model_version)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemover {
    /// Create a remover over any prediction API implementation
    ///
    /// # Errors
    /// - Invalid poll policy
    pub fn new<S: Into<String>>(
        api: Arc<dyn PredictionApi>,
        model_version: S,
        poll: PollPolicy,
    ) -> Result<Self> {
        poll.validate()?;
        Ok(Self {
            api,
            model_version: model_version.into(),
            poll,
        })
    }

    /// Create a remover talking HTTP to the configured service
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create HTTP client
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let model_version = config.model_version.clone();
        let poll = config.poll;
        let client = ReplicateClient::new(config)?;
        Self::new(Arc::new(client), model_version, poll)
    }

    #[must_use]
    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Remove the background of an uploaded image.
    ///
    /// Service-side and transport failures are wrapped in
    /// [`BgComposeError::Removal`]; timeouts and cancellation are returned
    /// as they are.
    ///
    /// # Errors
    /// - `Removal` wrapping `Startup`, `PredictionFailed` or `Network`
    /// - `Timeout` when the poll budget runs out
    /// - `Cancelled` when `cancel` fires
    pub async fn remove_background(
        &self,
        file: &UploadedFile,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let image = data_url::encode(&file.bytes, &file.mime_type());
        match self.run_prediction(&image, cancel).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_interruption() => Err(e),
            Err(e) => {
                warn!(error = %e, "Replicate API error");
                Err(BgComposeError::removal(e))
            },
        }
    }

    /// Create a job for `image` and poll it to completion, returning the output reference
    ///
    /// # Errors
    /// - `Startup` if the service returns no job identifier
    /// - `PredictionFailed` if the job fails or succeeds without output
    /// - `Timeout` / `Cancelled` per the poll budget and token
    #[instrument(skip(self, image, cancel), fields(version = %self.model_version))]
    pub async fn run_prediction(&self, image: &str, cancel: &CancellationToken) -> Result<String> {
        let created = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(BgComposeError::cancelled("cancelled before prediction started"));
            }
            created = self.api.create_prediction(&self.model_version, image) => created?,
        };

        let id = created
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BgComposeError::startup("service returned no prediction id"))?
            .to_string();
        info!(prediction_id = %id, "Prediction started");

        let finished = self.poll_until_terminal(&id, cancel).await?;
        finished.output_reference().ok_or_else(|| {
            BgComposeError::prediction_failed(format!(
                "prediction {} succeeded without a usable output",
                id
            ))
        })
    }

    /// Poll job `id` until it succeeds or fails, or the budget runs out
    ///
    /// # Errors
    /// - `PredictionFailed` on `failed`
    /// - `Timeout` after `max_attempts` polls or `timeout` elapsed
    /// - `Cancelled` when `cancel` fires
    /// - Errors from the API
    pub async fn poll_until_terminal(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        let timed_out = |attempts: &AtomicU32| BgComposeError::Timeout {
            attempts: attempts.load(Ordering::Relaxed),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(prediction_id = %id, "Polling cancelled");
                Err(BgComposeError::cancelled(format!("polling of prediction {} cancelled", id)))
            }
            polled = tokio::time::timeout(self.poll.timeout, self.poll_loop(id, &attempts)) => {
                match polled {
                    Ok(Ok(Some(prediction))) => Ok(prediction),
                    Ok(Ok(None)) | Err(_) => {
                        let err = timed_out(&attempts);
                        warn!(prediction_id = %id, error = %err, "Poll budget exhausted");
                        Err(err)
                    },
                    Ok(Err(e)) => Err(e),
                }
            }
        }
    }

    /// Returns `Ok(None)` when the attempt budget is spent
    async fn poll_loop(&self, id: &str, attempts: &AtomicU32) -> Result<Option<Prediction>> {
        loop {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let prediction = self.api.get_prediction(id).await?;
            debug!(prediction_id = %id, attempt, status = ?prediction.status, "Polled prediction");

            match prediction.status {
                Some(PredictionStatus::Succeeded) => return Ok(Some(prediction)),
                Some(PredictionStatus::Failed) => {
                    return Err(BgComposeError::prediction_failed(prediction.error_message()));
                },
                Some(PredictionStatus::Unknown) => {
                    warn!(prediction_id = %id, "Unrecognized prediction status, still waiting");
                },
                Some(PredictionStatus::Starting | PredictionStatus::Processing) | None => {},
            }

            if attempt >= self.poll.max_attempts {
                return Ok(None);
            }
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}
