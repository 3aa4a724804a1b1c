//! Error types and handling
//!
//! This module provides the error types used throughout the Insight engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Recoverability
//!
//! The agent loop uses `is_recoverable()` to decide what to do with a failed
//! cycle. Recoverable errors (transient network failures, rate limits,
//! unparsable model output) cause the cycle to be retried. Non-recoverable
//! errors (bad configuration, authentication failures, embedding dimension
//! mismatches) abort the run.
//!
//! # Security
//!
//! Error messages never embed credentials. API keys are carried as
//! `SecretString` in the engine and redacted before display.

use thiserror::Error;

/// Trait for Insight error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried. Non-recoverable errors require
    /// a configuration change or manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration and credentials
/// - **LLM Provider**: API failures, authentication errors, unparsable output
/// - **Knowledge**: Vector index and embedding failures
/// - **Literature**: PubMed and MyGene API failures
/// - **Execution**: Generated-code sandbox failures
/// - **Queue**: Task queue misuse
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Network("connection reset".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::DimensionMismatch { expected: 1536, actual: 768 };
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Path canonicalization failed for {0:?}: {1}")]
    PathCanonicalization(std::path::PathBuf, String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Could not parse model output: {0}")]
    Parse(String),

    // Knowledge store errors
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    // Biomedical API errors
    #[error("Literature API error: {0}")]
    Literature(String),

    // Generated code errors
    #[error("Code execution is disabled; enable [execution] to run generated code")]
    CodeExecutionDisabled,

    #[error("Code execution failed: {0}")]
    CodeExecution(String),

    #[error("Code execution timed out after {0} seconds")]
    CodeTimeout(u64),

    // Queue errors
    #[error("Task queue is empty")]
    EmptyQueue,

    #[error("Unknown task kind: {0}")]
    UnknownTaskKind(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",
            Self::MissingCredential(_) => {
                "Set the missing environment variable or store it in the OS keychain"
            }
            Self::PathCanonicalization(_, _) => "Invalid path specified",

            // LLM provider errors
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",
            Self::Authentication(_) => "The provider rejected the credentials. Check your API key",
            Self::RateLimited => "The provider is throttling requests. Wait and try again",
            Self::Timeout => "A remote service took too long to respond. Try again",
            Self::Parse(_) => "The model returned output in an unexpected format",

            // Knowledge store errors
            Self::VectorIndex(_) => "Vector database request failed. Check PINECONE_API_KEY and PINECONE_ENV",
            Self::DimensionMismatch { .. } => {
                "Embedding model and vector index disagree on dimension. Recreate the index or change the model"
            }
            Self::Embedding(_) => "Embedding request failed. Check your API key and network",

            // Biomedical API errors
            Self::Literature(_) => "PubMed or MyGene request failed. Check EMAIL and network",

            // Generated code errors
            Self::CodeExecutionDisabled => "Set [execution] enabled = true to allow generated code",
            Self::CodeExecution(_) => "Generated code failed to run",
            Self::CodeTimeout(_) => "Generated code ran too long. Raise execution.timeout_secs",

            // Queue errors
            Self::EmptyQueue => "No tasks left to execute",
            Self::UnknownTaskKind(_) => "The planner produced a task for an unsupported tool",

            // Network errors
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::KeyringError(_) => "OS keychain is unavailable. Use environment variables instead",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_)
            | Self::MissingCredential(_)
            | Self::PathCanonicalization(_, _)
            | Self::Authentication(_)
            | Self::DimensionMismatch { .. }
            | Self::CodeExecutionDisabled
            | Self::EmptyQueue
            | Self::KeyringError(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_recoverable() {
        assert!(EngineError::Network("reset".to_string()).is_recoverable());
        assert!(EngineError::RateLimited.is_recoverable());
        assert!(EngineError::Timeout.is_recoverable());
        assert!(EngineError::Parse("no json".to_string()).is_recoverable());
        assert!(EngineError::Literature("502".to_string()).is_recoverable());
        assert!(EngineError::CodeExecution("exit 1".to_string()).is_recoverable());
    }

    #[test]
    fn test_fatal_errors_are_not_recoverable() {
        assert!(!EngineError::Config("bad".to_string()).is_recoverable());
        assert!(!EngineError::MissingCredential("EMAIL".to_string()).is_recoverable());
        assert!(!EngineError::Authentication("401".to_string()).is_recoverable());
        assert!(!EngineError::DimensionMismatch {
            expected: 1536,
            actual: 3
        }
        .is_recoverable());
        assert!(!EngineError::CodeExecutionDisabled.is_recoverable());
        assert!(!EngineError::EmptyQueue.is_recoverable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = EngineError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 1536, got 768"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert_eq!(err.user_hint(), "File system operation failed");
    }
}
