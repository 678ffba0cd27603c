//! Error types for background composition operations

use thiserror::Error;

/// Result type alias for background composition operations
pub type Result<T> = std::result::Result<T, BgComposeError>;

/// Error types raised while processing a submission
#[derive(Error, Debug)]
pub enum BgComposeError {
    /// The submission is missing its image, or the image is empty
    #[error("{0}")]
    Validation(String),

    /// The prediction service did not hand back a job identifier
    #[error("Failed to start prediction: {0}")]
    Startup(String),

    /// The prediction service reported the job as failed
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    /// The poll budget (attempts or wall clock) ran out before a terminal status
    #[error("Prediction timed out after {attempts} poll(s) ({elapsed_ms}ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },

    /// The caller cancelled the in-flight submission
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// An image reference could not be resolved or decoded
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    /// Transport-level failures talking to the prediction service
    #[error("Network error: {0}")]
    Network(String),

    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Background removal failed; the cause is kept as the source
    #[error("Failed to process image with Replicate: {0}")]
    Removal(#[source] Box<BgComposeError>),

    /// Anything else that went wrong while processing
    #[error("{0}")]
    Processing(String),
}

impl BgComposeError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new startup error
    pub fn startup<S: Into<String>>(msg: S) -> Self {
        Self::Startup(msg.into())
    }

    /// Create a new prediction failure error
    pub fn prediction_failed<S: Into<String>>(msg: S) -> Self {
        Self::PredictionFailed(msg.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a new image load error
    pub fn image_load<S: Into<String>>(msg: S) -> Self {
        Self::ImageLoad(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a network error with the operation that failed
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(operation: S, error: E) -> Self {
        Self::Network(format!("{}: {}", operation.into(), error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create image load error naming which image failed
    pub fn image_load_error<E: std::fmt::Display>(which: &str, reference: &str, error: E) -> Self {
        Self::ImageLoad(format!(
            "{} image '{}': {}",
            which,
            truncate_reference(reference),
            error
        ))
    }

    /// Wrap a background removal failure
    #[must_use]
    pub fn removal(cause: BgComposeError) -> Self {
        Self::Removal(Box::new(cause))
    }

    /// Whether the error stops the poll loop without being a service-side failure
    #[must_use]
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled(_))
    }
}

/// Keep data URLs out of error messages
fn truncate_reference(reference: &str) -> String {
    const MAX: usize = 64;
    if reference.len() <= MAX {
        return reference.to_string();
    }
    let cut = (0..=MAX)
        .rev()
        .find(|i| reference.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &reference[..cut])
}
