//! Rich diagnostic error types for attribute construction and documents.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building or accessing NGSI-LD documents.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("invalid observedAt \"{value}\": expected a full DateTime, got {found}")]
    #[diagnostic(
        code(ngsild::model::date_format),
        help(
            "observedAt must be an ISO-8601 date-time such as `2022-01-01T12:00:00Z`. \
             Date-only and time-only values are accepted for TemporalProperty values, \
             not for metadata."
        )
    )]
    DateFormat { value: String, found: String },

    #[error("cannot map {kind} to an NGSI-LD {attribute}: {value}")]
    #[diagnostic(
        code(ngsild::model::unmatched_type),
        help(
            "Property values must be numbers, booleans, strings, lists or mappings. \
             GeoProperty values must be a GeoJSON geometry or a (lat, lon) pair."
        )
    )]
    UnmatchedAttributeType {
        attribute: &'static str,
        kind: String,
        value: String,
    },

    #[error("validation failed: {message}")]
    #[diagnostic(code(ngsild::model::validation))]
    Validation { message: String },

    #[error("no such key: \"{path}\"")]
    #[diagnostic(
        code(ngsild::model::lookup),
        help(
            "Dotted paths are resolved segment by segment. Every segment but the \
             last must name an existing nested attribute."
        )
    )]
    Lookup { path: String },

    #[error("\"{path}\" is not a nested attribute")]
    #[diagnostic(
        code(ngsild::model::not_a_document),
        help("Only mappings can be traversed with a dotted path.")
    )]
    NotADocument { path: String },

    #[error("missing or invalid \"{field}\" in entity payload")]
    #[diagnostic(
        code(ngsild::model::invalid_entity),
        help("An NGSI-LD entity must carry string `id` and `type` members.")
    )]
    InvalidEntity { field: &'static str },

    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(ngsild::model::io),
        help("Check that the file exists and that you have the required permissions.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    #[diagnostic(
        code(ngsild::model::json),
        help("The payload is not valid JSON, or its root is not an object.")
    )]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
