//! Test utilities: scripted prediction service and recording notifier
//!
//! These stand in for the remote service and the UI notification layer so
//! the workflow can be exercised without network access.

use crate::{
    error::{BgComposeError, Result},
    prediction::{Prediction, PredictionApi},
    services::{Notification, NotificationLevel, Notifier, ProcessingStage},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Build a prediction with the given status string and optional output string
#[must_use]
pub fn prediction(status: &str, output: Option<&str>) -> Prediction {
    serde_json::from_value(serde_json::json!({
        "id": "pred-123",
        "status": status,
        "output": output,
    }))
    .unwrap_or_default()
}

#[derive(Default)]
struct ScriptState {
    polls: VecDeque<Prediction>,
    last: Option<Prediction>,
    poll_times: Vec<Instant>,
    created_versions: Vec<String>,
    created_images: Vec<String>,
    fail_create: Option<String>,
}

/// Prediction service that replays a fixed sequence of poll responses.
///
/// Once the script is exhausted the last response repeats, which makes
/// "never finishes" scenarios easy to express.
pub struct ScriptedPredictionApi {
    create: Prediction,
    state: Mutex<ScriptState>,
}

impl ScriptedPredictionApi {
    #[must_use]
    pub fn new(polls: Vec<Prediction>) -> Self {
        Self {
            create: prediction("starting", None),
            state: Mutex::new(ScriptState {
                polls: polls.into(),
                ..ScriptState::default()
            }),
        }
    }

    /// Replace the job creation response
    #[must_use]
    pub fn with_create(mut self, create: Prediction) -> Self {
        self.create = create;
        self
    }

    /// Make job creation fail with a network error
    #[must_use]
    pub fn failing_create<S: Into<String>>(self, message: S) -> Self {
        self.lock().fail_create = Some(message.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Instants at which the status endpoint was hit
    #[must_use]
    pub fn poll_times(&self) -> Vec<Instant> {
        self.lock().poll_times.clone()
    }

    /// Model versions sent to the creation endpoint
    #[must_use]
    pub fn created_versions(&self) -> Vec<String> {
        self.lock().created_versions.clone()
    }

    /// Image references sent to the creation endpoint
    #[must_use]
    pub fn created_images(&self) -> Vec<String> {
        self.lock().created_images.clone()
    }

    /// Whether any request reached the service
    #[must_use]
    pub fn was_called(&self) -> bool {
        let state = self.lock();
        !state.created_versions.is_empty() || !state.poll_times.is_empty()
    }
}

#[async_trait]
impl PredictionApi for ScriptedPredictionApi {
    async fn create_prediction(&self, version: &str, image: &str) -> Result<Prediction> {
        let mut state = self.lock();
        state.created_versions.push(version.to_string());
        state.created_images.push(image.to_string());
        if let Some(message) = &state.fail_create {
            return Err(BgComposeError::network_error("create prediction", message));
        }
        Ok(self.create.clone())
    }

    async fn get_prediction(&self, _id: &str) -> Result<Prediction> {
        let mut state = self.lock();
        state.poll_times.push(Instant::now());
        let next = match state.polls.pop_front() {
            Some(next) => next,
            None => state.last.clone().unwrap_or_default(),
        };
        state.last = Some(next.clone());
        Ok(next)
    }
}

/// Notifier that keeps every notification and stage for inspection
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    stages: Mutex<Vec<ProcessingStage>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, with their levels
    #[must_use]
    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|n| (n.level, n.message.clone()))
            .collect()
    }

    /// Stages reported so far
    #[must_use]
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    fn report_stage(&self, stage: ProcessingStage) {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stage);
    }
}
