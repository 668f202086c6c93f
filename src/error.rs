//! Top-level error type.
//!
//! Each subsystem defines its own error with miette `#[diagnostic]` derives:
//! [`ModelError`] for building and decoding documents, [`ApiError`] for
//! broker interactions, [`ConfigError`] for the configuration file.
//! [`NgsiError`] wraps them without losing codes or help text.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::api::ApiError;
pub use crate::config::ConfigError;
pub use crate::model::ModelError;

#[derive(Debug, Error, Diagnostic)]
pub enum NgsiError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl NgsiError {
    /// HTTP status behind the error, when the broker answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => e.status(),
            _ => None,
        }
    }
}

/// Convenience result type.
pub type NgsiResult<T> = std::result::Result<T, NgsiError>;
