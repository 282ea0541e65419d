//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`StriderError`] covers the fallible edges of the
//! engine: loading and validating configuration. Frame-time operations such
//! as scheduling and updating clips are infallible; misuse of those APIs is
//! reported through debug assertions and the log instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strider_core::errors::{StriderError, Result};
//!
//! fn load_settings(text: &str) -> Result<()> {
//!     let _value: serde_json::Value = serde_json::from_str(text)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Strider engine.
#[derive(Error, Debug)]
pub enum StriderError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A settings field holds a value outside its accepted range.
    #[error("Invalid setting `{field}`: {reason}")]
    InvalidSetting {
        /// Name of the offending field
        field: &'static str,
        /// Human readable constraint that was violated
        reason: String,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StriderError {
    /// Shorthand for [`StriderError::InvalidSetting`].
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }
}

/// Alias for `Result<T, StriderError>`.
pub type Result<T> = std::result::Result<T, StriderError>;
