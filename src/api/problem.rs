//! RFC 7807 problem details and the status-translation rule.
//!
//! NGSI-LD brokers report failures as `application/problem+json`:
//!
//! ```json
//! {
//!   "type": "https://uri.etsi.org/ngsi-ld/errors/ResourceNotFound",
//!   "title": "Entity Not Found",
//!   "detail": "urn:ngsi-ld:Device:1"
//! }
//! ```
//!
//! [`check_status`] is the single place a broker response becomes an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::broker::BrokerResponse;
use super::error::{ApiError, ApiResult};

/// Namespace of the standard NGSI-LD problem types.
pub const NGSILD_ERRORS: &str = "https://uri.etsi.org/ngsi-ld/errors/";

/// An RFC 7807 problem-details body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Parse a body; `None` if it is not a JSON object or carries no
    /// recognizable member.
    pub fn parse(body: &str) -> Option<Self> {
        let problem: Self = serde_json::from_str(body).ok()?;
        let empty = problem.problem_type.is_none()
            && problem.title.is_none()
            && problem.detail.is_none();
        (!empty).then_some(problem)
    }

    /// Short NGSI-LD error name (`ResourceNotFound`, `AlreadyExists`, ...).
    pub fn kind(&self) -> Option<&str> {
        let t = self.problem_type.as_deref()?;
        Some(t.strip_prefix(NGSILD_ERRORS).unwrap_or(t))
    }
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            self.problem_type.as_deref(),
            self.title.as_deref(),
            self.detail.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        f.write_str(&parts.join(" - "))
    }
}

/// Translate a non-success response into [`ApiError::Status`].
pub fn check_status(response: &BrokerResponse) -> ApiResult<()> {
    if response.is_success() {
        return Ok(());
    }
    let problem = ProblemDetails::parse(&response.body);
    tracing::debug!(
        status = response.status,
        url = %response.url,
        kind = problem.as_ref().and_then(ProblemDetails::kind).unwrap_or("-"),
        "broker reported an error"
    );
    Err(ApiError::Status {
        status: response.status,
        url: response.url.clone(),
        problem,
    })
}
