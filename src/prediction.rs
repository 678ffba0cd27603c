//! Remote prediction service: wire types, API abstraction and HTTP client
//!
//! The service is driven through two endpoints:
//! `POST {base}/predictions` with `{version, input: {image}}` creates a job,
//! `GET {base}/predictions/{id}` reports `{status, output?}`. Both use
//! bearer-token authentication.

use crate::{
    config::ClientConfig,
    error::{BgComposeError, Result},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Lifecycle status of a prediction job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    /// Any other status string, `canceled` included
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    /// Whether polling stops at this status
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A prediction job as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<PredictionStatus>,
    /// Service-defined output, usually a URL string or a list of them
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Service-defined error detail for failed jobs
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl Prediction {
    /// Reference to the result image: the output string, or the first string of an output list
    #[must_use]
    pub fn output_reference(&self) -> Option<String> {
        match self.output.as_ref()? {
            serde_json::Value::String(reference) => Some(reference.clone()),
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(serde_json::Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Human-readable failure detail
    #[must_use]
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Null) | None => "Prediction failed".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Body of the job creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePredictionRequest {
    pub version: String,
    pub input: PredictionInput,
}

/// Model input of the job creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionInput {
    /// Image reference (URL or data URL)
    pub image: String,
}

/// Abstraction over the prediction service
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Create a job for `version` with `image` as input
    ///
    /// # Errors
    /// - Transport failures
    /// - Service rejected the request
    async fn create_prediction(&self, version: &str, image: &str) -> Result<Prediction>;

    /// Fetch the current state of job `id`
    ///
    /// A JSON body is returned even under an error HTTP status; without a
    /// terminal `status` the caller keeps polling.
    ///
    /// # Errors
    /// - Transport failures
    /// - Bodies that are not a prediction object
    async fn get_prediction(&self, id: &str) -> Result<Prediction>;
}

/// HTTP client for a Replicate-compatible prediction API
#[derive(Debug, Clone)]
pub struct ReplicateClient {
    client: Client,
    config: ClientConfig,
}

impl ReplicateClient {
    /// Create a new client
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to create HTTP client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| BgComposeError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client, config })
    }

    /// Create a client around an existing `reqwest::Client`
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_client(client: Client, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn read_prediction(response: reqwest::Response, url: &str) -> Result<(reqwest::StatusCode, Option<Prediction>, String)> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BgComposeError::network_error(format!("Failed to read response from {}", url), e))?;
        let prediction = serde_json::from_str::<Prediction>(&body).ok();
        Ok((status, prediction, body))
    }
}

#[async_trait]
impl PredictionApi for ReplicateClient {
    #[instrument(skip(self, image), fields(image_len = image.len()))]
    async fn create_prediction(&self, version: &str, image: &str) -> Result<Prediction> {
        let url = self.config.predictions_url();
        let request = CreatePredictionRequest {
            version: version.to_string(),
            input: PredictionInput {
                image: image.to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| BgComposeError::network_error(format!("Failed to create prediction at {}", url), e))?;

        let (status, prediction, body) = Self::read_prediction(response, &url).await?;
        debug!(http_status = %status, "Prediction create response");

        if !status.is_success() {
            return Err(BgComposeError::startup(format!(
                "HTTP {} from {}: {}",
                status,
                url,
                body.chars().take(200).collect::<String>()
            )));
        }

        prediction.ok_or_else(|| BgComposeError::startup("Response is not a prediction object"))
    }

    #[instrument(skip(self))]
    async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let url = self.config.prediction_url(id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| BgComposeError::network_error(format!("Failed to poll {}", url), e))?;

        let (status, prediction, body) = Self::read_prediction(response, &url).await?;

        match prediction {
            Some(prediction) => {
                if !status.is_success() {
                    warn!(http_status = %status, status = ?prediction.status, "Poll returned an error status, still waiting");
                }
                Ok(prediction)
            },
            None if status.is_success() => Err(BgComposeError::network_error(
                format!("Unexpected response polling {}", url),
                "not a prediction object",
            )),
            None => Err(BgComposeError::network_error(
                format!("HTTP {} polling {}", status, url),
                body.chars().take(200).collect::<String>(),
            )),
        }
    }
}
