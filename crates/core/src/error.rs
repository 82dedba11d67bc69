//! Error types for orgmem.
//!
//! A single error enum covers configuration, I/O, provider, index and
//! generation failures. Every variant maps to a stable `code()` so callers
//! can render differential messages without matching on strings.

use thiserror::Error;

/// Failure reported by an external provider (embedding or generative model).
///
/// Rate limits and timeouts are transient and may be retried; everything
/// else is fatal for the current request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider rejected the call because of rate limiting (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Request timed out before the provider answered
    #[error("timed out: {0}")]
    Timeout(String),

    /// Provider answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify an HTTP status and body into a provider error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }
}

/// Terminal outcome of an answer-generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Transient provider failures persisted past the retry ceiling
    #[error("generative model overloaded after {attempts} attempts")]
    Overloaded { attempts: u32 },

    /// The provider rejected the request
    #[error("generative model error: {0}")]
    Provider(String),

    /// Anything else that went wrong while generating
    #[error("unexpected generation error: {0}")]
    Unexpected(String),
}

impl GenerationFailure {
    /// Message safe to show to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Overloaded { .. } => {
                "The service is currently experiencing high load. Please try again in a moment."
            }
            Self::Provider(_) => "Failed to generate answer due to a model provider error.",
            Self::Unexpected(_) => "An unexpected error occurred while generating the answer.",
        }
    }
}

/// Unified error type for orgmem.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Knowledge base errors without a more specific kind
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// The question was blank
    #[error("Question cannot be empty")]
    EmptyQuestion,

    /// Nothing left to embed after trimming
    #[error("No valid texts to embed")]
    EmptyInput,

    /// Vector length or batch length did not match the index
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The index holds no chunks yet
    #[error("No documents indexed yet")]
    NoDocumentsIndexed,

    /// Persisted index artifacts are missing or inconsistent
    #[error("Corrupt index state: {0}")]
    CorruptState(String),

    /// Answer generation failed
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Provider(e) if e.is_transient() => "PROVIDER_TRANSIENT",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Knowledge(_) => "KNOWLEDGE_ERROR",
            Self::EmptyQuestion => "EMPTY_QUESTION",
            Self::EmptyInput => "EMPTY_INPUT",
            Self::DimensionMismatch(_) => "DIMENSION_MISMATCH",
            Self::NoDocumentsIndexed => "NO_DOCUMENTS",
            Self::CorruptState(_) => "CORRUPT_STATE",
            Self::Generation(GenerationFailure::Overloaded { .. }) => "SERVICE_BUSY",
            Self::Generation(_) => "ASK_FAILED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Input was rejected before any work was done; never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyQuestion | Self::EmptyInput | Self::DimensionMismatch(_)
        )
    }

    /// Message suitable for an end user. Provider detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(failure) => failure.user_message().to_string(),
            Self::Provider(_) => "Failed to reach the model provider.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
