//! Talking to an NGSI-LD broker.
//!
//! [`EntityService`] implements the entity operations on top of any
//! [`Broker`]; [`HttpBroker`] is the HTTP transport and [`Client`] wires
//! the two together from a [`ClientConfig`](crate::config::ClientConfig).

pub mod broker;
pub mod client;
pub mod entities;
pub mod error;
pub mod http;
pub mod problem;

pub use broker::{Broker, BrokerRequest, BrokerResponse, Method};
pub use client::Client;
pub use entities::{EntityQuery, EntityService, OnConflict, context_link};
pub use error::{ApiError, ApiResult};
pub use http::HttpBroker;
pub use problem::ProblemDetails;
