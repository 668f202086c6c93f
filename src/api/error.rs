//! Rich diagnostic error types for broker interactions.

use miette::Diagnostic;
use thiserror::Error;

use super::problem::ProblemDetails;
use crate::model::ModelError;

/// Errors from talking to an NGSI-LD broker.
#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("entity already exists: {id}")]
    #[diagnostic(
        code(ngsild::api::already_exists),
        help(
            "The broker refused to create a duplicate. Pass `skip` to ignore it, \
             `overwrite` to replace it, or use `upsert`."
        )
    )]
    AlreadyExists { id: String },

    #[error("broker returned HTTP {status}{}", problem_suffix(.problem))]
    #[diagnostic(code(ngsild::api::status))]
    Status {
        status: u16,
        url: String,
        problem: Option<ProblemDetails>,
    },

    #[error("broker accepted {id} but sent no Location header")]
    #[diagnostic(
        code(ngsild::api::missing_location),
        help(
            "NGSI-LD brokers must answer a create with the new entity's URI. \
             Set `ignore_errors` to tolerate brokers that omit it."
        )
    )]
    MissingLocationHeader { id: String },

    #[error("broker returned wrong id: expected {expected}, returned {returned}")]
    #[diagnostic(
        code(ngsild::api::id_mismatch),
        help(
            "The Location header names a different entity than the one submitted. \
             Client and broker disagree about identifiers; this is never ignored."
        )
    )]
    IdentifierMismatch { expected: String, returned: String },

    #[error("invalid request: {message}")]
    #[diagnostic(code(ngsild::api::validation))]
    Validation { message: String },

    #[error("transport error for {url}: {message}")]
    #[diagnostic(
        code(ngsild::api::transport),
        help("Check that the broker URL is correct and the broker is reachable.")
    )]
    Transport { url: String, message: String },

    #[error("unexpected response from broker: {message}")]
    #[diagnostic(
        code(ngsild::api::response),
        help("The broker answered with something that is not valid NGSI-LD.")
    )]
    Response { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),
}

impl ApiError {
    /// HTTP status attached to the error, if the broker answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AlreadyExists { .. } => Some(409),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The RFC 7807 body the broker sent, if any.
    pub fn problem(&self) -> Option<&ProblemDetails> {
        match self {
            Self::Status { problem, .. } => problem.as_ref(),
            _ => None,
        }
    }
}

fn problem_suffix(problem: &Option<ProblemDetails>) -> String {
    match problem {
        Some(p) => format!(": {p}"),
        None => String::new(),
    }
}

/// Result type for broker operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
