//! NGSI-LD data model: ordered documents, attribute builders and entities.
//!
//! Everything here is pure: no I/O besides explicit `load`/`save`, no
//! network access.

pub mod attribute;
pub mod document;
pub mod entity;
pub mod error;
pub mod geometry;

pub use attribute::{
    AttrType, AttrValue, DateInput, GeoOptions, MultiRelationshipOptions, PerTarget,
    PropertyOptions, RelationshipOptions,
};
pub use document::{Map, NgsiDocument};
pub use entity::{CORE_CONTEXT, Entity, EntityRef};
pub use error::{ModelError, ModelResult};
pub use geometry::{Geometry, Position};
