//! The broker capability consumed by the entity service.
//!
//! A [`Broker`] sends one HTTP exchange and reports what came back. It owns
//! everything below the NGSI-LD layer: connection reuse, TLS, timeouts and
//! default headers. [`HttpBroker`](super::http::HttpBroker) is the real
//! implementation; tests plug in scripted fakes.

use std::fmt;

use serde_json::Value;

use super::error::{ApiError, ApiResult};
use super::problem;

/// HTTP methods used against the entities endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRequest {
    pub method: Method,
    pub url: String,
    /// Per-request headers; they override the broker's defaults.
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl BrokerRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            params: Vec::new(),
            json: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Value of a request header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Value of a query parameter.
    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// What came back: status, headers, raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerResponse {
    pub status: u16,
    /// The request URL, kept for error reports.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl BrokerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of a response header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Response {
            message: format!("failed to parse JSON: {e}"),
        })
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Connection to an NGSI-LD broker.
///
/// Implementations must be thread-safe if the service is shared between
/// threads; the service layer adds no locking of its own.
pub trait Broker: Send + Sync {
    /// Perform one exchange. Non-2xx answers are `Ok` responses; only a
    /// failure to get any answer is an error.
    fn send(&self, request: BrokerRequest) -> ApiResult<BrokerResponse>;

    /// Turn a non-success response into a domain error.
    fn raise_for_status(&self, response: &BrokerResponse) -> ApiResult<()> {
        problem::check_status(response)
    }

    /// Broker-wide default for replacing entities on create conflicts.
    fn overwrite(&self) -> bool {
        false
    }

    /// Tolerate a missing Location header on create.
    fn ignore_errors(&self) -> bool {
        false
    }
}

impl<B: Broker + ?Sized> Broker for std::sync::Arc<B> {
    fn send(&self, request: BrokerRequest) -> ApiResult<BrokerResponse> {
        (**self).send(request)
    }

    fn raise_for_status(&self, response: &BrokerResponse) -> ApiResult<()> {
        (**self).raise_for_status(response)
    }

    fn overwrite(&self) -> bool {
        (**self).overwrite()
    }

    fn ignore_errors(&self) -> bool {
        (**self).ignore_errors()
    }
}
