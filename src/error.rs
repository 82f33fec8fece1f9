//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for elkcross operations
#[derive(Error, Debug)]
pub enum ElkError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or schema-violating input data. Fatal: aborts before any fit.
    #[error("Data format error: {message}")]
    DataFormat { message: String },

    /// Optimizer failure for a given formula. Reported per-model; does not
    /// abort the remaining fits.
    #[error("Model did not converge [{formula}]: {message}")]
    Convergence { formula: String, message: String },

    /// Random-intercept variance collapsed to (numerically) zero.
    #[error("Singular fit [{formula}]: random-intercept variance {variance:.3e} is effectively zero")]
    SingularFit { formula: String, variance: f64 },

    /// AIC comparison requested across models with different likelihood bases.
    #[error("Models are not comparable: {message}")]
    IncomparableModels { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },
}

/// Type alias for Results using ElkError
pub type Result<T> = std::result::Result<T, ElkError>;

impl ElkError {
    /// Create a data format error with a message
    pub fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat {
            message: message.into(),
        }
    }

    /// Create a convergence error for a formula
    pub fn convergence(formula: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Convergence {
            formula: formula.into(),
            message: message.into(),
        }
    }

    /// Create an incomparable-models error
    pub fn incomparable(message: impl Into<String>) -> Self {
        Self::IncomparableModels {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
