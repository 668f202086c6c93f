// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ngsild-client
//!
//! A blocking client for NGSI-LD context brokers.
//!
//! ## Architecture
//!
//! - **Model** (`model`): ordered JSON-LD documents, entities, and builders
//!   for Property, GeoProperty, temporal Property and Relationship attributes
//! - **API** (`api`): entity create/get/exists/delete/upsert/update/query/count
//!   over a pluggable [`Broker`](api::Broker); HTTP via `ureq`
//! - **Config** (`config`): TOML client configuration
//!
//! ## Library usage
//!
//! ```no_run
//! use ngsild_client::api::Client;
//! use ngsild_client::config::ClientConfig;
//! use ngsild_client::model::{Entity, PropertyOptions};
//!
//! let mut room = Entity::new("Room", "Room1");
//! room.prop("temperature", 23.5, PropertyOptions::default().unit_code("CEL")).unwrap();
//!
//! let client = Client::new(ClientConfig::default());
//! client.entities().upsert(&room).unwrap();
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod iso8601;
pub mod model;
pub mod url;
pub mod urn;

pub use error::{NgsiError, NgsiResult};
