//! NGSI-LD entity: an [`NgsiDocument`] rooted at `@context`, `id` and `type`.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use super::attribute::{
    AttrValue, DateInput, GeoOptions, MultiRelationshipOptions, PropertyOptions,
    RelationshipOptions,
};
use super::document::{Map, NgsiDocument};
use super::error::{ModelError, ModelResult};
use crate::clock::SharedClock;
use crate::urn;

/// The NGSI-LD core JSON-LD context.
pub const CORE_CONTEXT: &str = "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld";

/// Root members the builders never overwrite.
const ROOT_KEYS: [&str; 3] = ["@context", "id", "type"];

/// Anything that identifies an entity: an identifier string or an entity.
pub trait EntityRef {
    fn entity_id(&self) -> &str;
}

impl EntityRef for str {
    fn entity_id(&self) -> &str {
        self
    }
}

impl EntityRef for String {
    fn entity_id(&self) -> &str {
        self
    }
}

impl EntityRef for Entity {
    fn entity_id(&self) -> &str {
        self.id()
    }
}

impl<T: EntityRef + ?Sized> EntityRef for &T {
    fn entity_id(&self) -> &str {
        (**self).entity_id()
    }
}

/// An NGSI-LD entity.
///
/// Constructors guarantee string `id` and `type` members. [`Entity::remove`]
/// refuses to drop them and the attribute builders refuse to replace them.
#[derive(Clone, PartialEq)]
pub struct Entity {
    doc: NgsiDocument,
}

impl Entity {
    /// New entity with the core context.
    ///
    /// Short identifiers are expanded to `urn:ngsi-ld:<type>:<id>`;
    /// identifiers already in URN form are kept.
    pub fn new(entity_type: &str, id: &str) -> Self {
        Self::with_document(NgsiDocument::new(), entity_type, id, vec![CORE_CONTEXT.into()])
    }

    /// New entity whose attribute timestamps come from `clock`.
    pub fn with_clock(entity_type: &str, id: &str, clock: SharedClock) -> Self {
        Self::with_document(
            NgsiDocument::with_clock(clock),
            entity_type,
            id,
            vec![CORE_CONTEXT.into()],
        )
    }

    /// New entity with an explicit `@context` list.
    pub fn with_context(entity_type: &str, id: &str, context: Vec<String>) -> Self {
        Self::with_document(NgsiDocument::new(), entity_type, id, context)
    }

    fn with_document(
        mut doc: NgsiDocument,
        entity_type: &str,
        id: &str,
        context: Vec<String>,
    ) -> Self {
        let id = if urn::is_prefixed(id) {
            id.to_string()
        } else {
            urn::prefix(&format!("{entity_type}:{id}"))
        };
        doc.insert("@context", context);
        doc.insert("id", id);
        doc.insert("type", entity_type);
        Self { doc }
    }

    /// Wrap a document received from a broker or read from disk.
    pub fn from_document(doc: NgsiDocument) -> ModelResult<Self> {
        for field in ["id", "type"] {
            if !doc.as_map().get(field).is_some_and(Value::is_string) {
                return Err(ModelError::InvalidEntity { field });
            }
        }
        Ok(Self { doc })
    }

    pub fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Self::from_document(NgsiDocument::from_map(map)),
            _ => Err(ModelError::InvalidEntity { field: "id" }),
        }
    }

    pub fn from_json(payload: &str) -> ModelResult<Self> {
        Self::from_document(NgsiDocument::from_json(payload)?)
    }

    pub fn load(path: &Path) -> ModelResult<Self> {
        Self::from_document(NgsiDocument::load(path)?)
    }

    pub fn save(&self, path: &Path) -> ModelResult<()> {
        self.doc.save(path)
    }

    pub fn id(&self) -> &str {
        self.root_str("id")
    }

    pub fn entity_type(&self) -> &str {
        self.root_str("type")
    }

    fn root_str(&self, key: &str) -> &str {
        self.doc.as_map().get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// The `@context` member, if any.
    pub fn context(&self) -> Option<&Value> {
        self.doc.as_map().get("@context")
    }

    pub fn document(&self) -> &NgsiDocument {
        &self.doc
    }

    /// The JSON payload sent to the broker.
    pub fn payload(&self) -> &Map {
        self.doc.as_map()
    }

    pub fn to_json(&self) -> String {
        self.doc.to_json()
    }

    pub fn to_json_pretty(&self) -> String {
        self.doc.to_json_pretty()
    }

    // -----------------------------------------------------------------------
    // Attribute access
    // -----------------------------------------------------------------------

    pub fn get(&self, path: &str) -> ModelResult<&Value> {
        self.doc.get(path)
    }

    /// Remove an attribute (or a dotted sub-member). `id` and `type` stay.
    pub fn remove(&mut self, path: &str) -> ModelResult<Value> {
        if path == "id" || path == "type" {
            return Err(ModelError::Validation {
                message: format!("\"{path}\" cannot be removed from an entity"),
            });
        }
        self.doc.delete(path)
    }

    fn check_attribute_name(name: &str) -> ModelResult<()> {
        if ROOT_KEYS.contains(&name) {
            return Err(ModelError::Validation {
                message: format!("\"{name}\" is an entity member, not an attribute name"),
            });
        }
        Ok(())
    }

    pub fn prop(
        &mut self,
        name: &str,
        value: impl Into<AttrValue>,
        opts: PropertyOptions,
    ) -> ModelResult<&mut Self> {
        Self::check_attribute_name(name)?;
        self.doc.prop(name, value, opts)?;
        Ok(self)
    }

    pub fn gprop(
        &mut self,
        name: &str,
        value: impl Into<AttrValue>,
        opts: GeoOptions,
    ) -> ModelResult<&mut Self> {
        Self::check_attribute_name(name)?;
        self.doc.gprop(name, value, opts)?;
        Ok(self)
    }

    pub fn tprop(&mut self, name: &str, value: impl Into<DateInput>) -> ModelResult<&mut Self> {
        Self::check_attribute_name(name)?;
        self.doc.tprop(name, value)?;
        Ok(self)
    }

    pub fn rel<T: EntityRef + ?Sized>(
        &mut self,
        name: &str,
        target: &T,
        opts: RelationshipOptions,
    ) -> ModelResult<&mut Self> {
        Self::check_attribute_name(name)?;
        self.doc.rel(name, target, opts)?;
        Ok(self)
    }

    pub fn rels<T: EntityRef>(
        &mut self,
        name: &str,
        targets: &[T],
        opts: MultiRelationshipOptions,
    ) -> ModelResult<&mut Self> {
        Self::check_attribute_name(name)?;
        self.doc.rels(name, targets, opts)?;
        Ok(self)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("type", &self.entity_type())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_pretty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_id_is_expanded_with_type() {
        let e = Entity::new("AirQualityObserved", "RZ:Obsv4567");
        assert_eq!(e.id(), "urn:ngsi-ld:AirQualityObserved:RZ:Obsv4567");
        assert_eq!(e.entity_type(), "AirQualityObserved");
    }

    #[test]
    fn urn_id_is_kept() {
        let e = Entity::new("Device", "urn:ngsi-ld:Device:1");
        assert_eq!(e.id(), "urn:ngsi-ld:Device:1");
    }

    #[test]
    fn root_key_order() {
        let mut e = Entity::new("Device", "1");
        e.prop("battery", 0.8, PropertyOptions::new()).unwrap();
        let keys: Vec<_> = e.payload().keys().map(String::as_str).collect();
        assert_eq!(keys, ["@context", "id", "type", "battery"]);
    }

    #[test]
    fn relationship_to_entity_uses_its_id() {
        let building = Entity::new("Building", "B1");
        let mut e = Entity::new("Device", "1");
        e.rel("locatedIn", &building, RelationshipOptions::new()).unwrap();
        assert_eq!(
            e.get("locatedIn.object").unwrap(),
            &json!("urn:ngsi-ld:Building:B1")
        );
    }

    #[test]
    fn from_value_requires_id_and_type() {
        let err = Entity::from_value(json!({"type": "Device"})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidEntity { field: "id" }));
        let e = Entity::from_value(json!({"id": "urn:ngsi-ld:Device:1", "type": "Device"})).unwrap();
        assert_eq!(e.id(), "urn:ngsi-ld:Device:1");
    }

    #[test]
    fn id_cannot_be_removed() {
        let mut e = Entity::new("Device", "1");
        assert!(e.remove("id").is_err());
        assert!(e.remove("type").is_err());
    }

    #[test]
    fn builders_refuse_root_members() {
        let mut e = Entity::new("Device", "1");
        for name in ["id", "type", "@context"] {
            let err = e.prop(name, 5, PropertyOptions::new()).unwrap_err();
            assert!(matches!(err, ModelError::Validation { .. }), "{name}");
        }
        assert!(e.tprop("type", "2022-01-01").is_err());
        assert!(e.rel("id", "Device:2", RelationshipOptions::new()).is_err());
        assert!(e.gprop("@context", (1.0, 2.0), GeoOptions::new()).is_err());
        assert!(e.rels("type", &["Device:2"], MultiRelationshipOptions::default()).is_err());
        assert_eq!(e.id(), "urn:ngsi-ld:Device:1");
        assert_eq!(e.entity_type(), "Device");
        assert_eq!(e.context(), Some(&json!([CORE_CONTEXT])));
    }
}
