//! Attribute builders: Property, GeoProperty, TemporalProperty, Relationship.
//!
//! Each builder turns a user value plus optional metadata into an NGSI-LD
//! attribute fragment. Fragments always start with their `type` member.
//! Builders live on [`NgsiDocument`] because `observedAt` resolution reads
//! and updates the document's timestamp cache.
//!
//! A builder either returns a complete fragment or an error; nothing is
//! attached to the document on failure.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Number, Value, json};

use super::document::{Map, NgsiDocument};
use super::entity::EntityRef;
use super::error::{ModelError, ModelResult};
use super::geometry::Geometry;
use crate::iso8601::{self, Temporal, TemporalType};
use crate::{url, urn};

pub const TYPE: &str = "type";
pub const VALUE: &str = "value";
pub const OBJECT: &str = "object";
pub const UNIT_CODE: &str = "unitCode";
pub const OBSERVED_AT: &str = "observedAt";
pub const DATASET_ID: &str = "datasetId";

/// The four NGSI-LD attribute kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Property,
    GeoProperty,
    TemporalProperty,
    Relationship,
}

impl AttrType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "Property",
            Self::GeoProperty => "GeoProperty",
            Self::TemporalProperty => "TemporalProperty",
            Self::Relationship => "Relationship",
        }
    }

    /// Kind of an attribute fragment, read from its `type` member.
    pub fn of(fragment: &Value) -> Option<Self> {
        match fragment.get(TYPE)?.as_str()? {
            "Property" => Some(Self::Property),
            "GeoProperty" => Some(Self::GeoProperty),
            "TemporalProperty" => Some(Self::TemporalProperty),
            "Relationship" => Some(Self::Relationship),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder inputs
// ---------------------------------------------------------------------------

/// Any value a caller may hand to a builder.
///
/// Each builder accepts a subset and rejects the rest with
/// [`ModelError::UnmatchedAttributeType`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Value>),
    Map(Map),
    Temporal(Temporal),
    Geometry(Geometry),
    /// `(latitude, longitude)`.
    LatLon(f64, f64),
}

impl AttrValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::Temporal(_) => "temporal value",
            Self::Geometry(_) => "geometry",
            Self::LatLon(..) => "(lat, lon) pair",
        }
    }

    fn unmatched(&self, attribute: AttrType) -> ModelError {
        ModelError::UnmatchedAttributeType {
            attribute: attribute.as_str(),
            kind: self.kind().to_string(),
            value: format!("{self:?}"),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(a) => Self::List(a),
            Value::Object(m) => Self::Map(m),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Number(v.into())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Number(v.into())
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Number(v.into())
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        Self::Number(v.into())
    }
}

impl From<f64> for AttrValue {
    /// Non-finite floats have no JSON form and map to `Null`.
    fn from(v: f64) -> Self {
        Number::from_f64(v).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Map> for AttrValue {
    fn from(v: Map) -> Self {
        Self::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for AttrValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Temporal> for AttrValue {
    fn from(v: Temporal) -> Self {
        Self::Temporal(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Temporal(v.into())
    }
}

impl From<NaiveDate> for AttrValue {
    fn from(v: NaiveDate) -> Self {
        Self::Temporal(v.into())
    }
}

impl From<Geometry> for AttrValue {
    fn from(v: Geometry) -> Self {
        Self::Geometry(v)
    }
}

impl From<(f64, f64)> for AttrValue {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::LatLon(lat, lon)
    }
}

/// A date given to a builder: explicit, or [`DateInput::Auto`] to use the
/// document's cached timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    Auto,
    Text(String),
    Value(Temporal),
}

impl From<&str> for DateInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for DateInput {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Temporal> for DateInput {
    fn from(v: Temporal) -> Self {
        Self::Value(v)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Value(v.into())
    }
}

impl From<NaiveDate> for DateInput {
    fn from(v: NaiveDate) -> Self {
        Self::Value(v.into())
    }
}

impl From<NaiveTime> for DateInput {
    fn from(v: NaiveTime) -> Self {
        Self::Value(v.into())
    }
}

// ---------------------------------------------------------------------------
// Builder options
// ---------------------------------------------------------------------------

/// Metadata for a Property.
#[derive(Debug, Clone, Default)]
pub struct PropertyOptions {
    pub unit_code: Option<String>,
    pub observed_at: Option<DateInput>,
    pub dataset_id: Option<String>,
    /// Extra members merged last; they win over builder-set keys.
    pub userdata: Option<Map>,
    /// Percent-encode string values.
    pub escape: bool,
}

impl PropertyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit_code(mut self, code: impl Into<String>) -> Self {
        self.unit_code = Some(code.into());
        self
    }

    pub fn observed_at(mut self, at: impl Into<DateInput>) -> Self {
        self.observed_at = Some(at.into());
        self
    }

    pub fn dataset_id(mut self, id: impl Into<String>) -> Self {
        self.dataset_id = Some(id.into());
        self
    }

    pub fn userdata(mut self, data: Map) -> Self {
        self.userdata = Some(data);
        self
    }

    pub fn escape(mut self, escape: bool) -> Self {
        self.escape = escape;
        self
    }
}

/// Metadata for a GeoProperty.
#[derive(Debug, Clone, Default)]
pub struct GeoOptions {
    pub observed_at: Option<DateInput>,
    pub dataset_id: Option<String>,
}

impl GeoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed_at(mut self, at: impl Into<DateInput>) -> Self {
        self.observed_at = Some(at.into());
        self
    }

    pub fn dataset_id(mut self, id: impl Into<String>) -> Self {
        self.dataset_id = Some(id.into());
        self
    }
}

/// Metadata for a single-valued Relationship.
///
/// `userdata` is only merged when `dataset_id` is also set.
#[derive(Debug, Clone, Default)]
pub struct RelationshipOptions {
    pub observed_at: Option<DateInput>,
    pub dataset_id: Option<String>,
    pub userdata: Option<Map>,
}

impl RelationshipOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed_at(mut self, at: impl Into<DateInput>) -> Self {
        self.observed_at = Some(at.into());
        self
    }

    pub fn dataset_id(mut self, id: impl Into<String>) -> Self {
        self.dataset_id = Some(id.into());
        self
    }

    pub fn userdata(mut self, data: Map) -> Self {
        self.userdata = Some(data);
        self
    }
}

/// A metadata argument of a multi-valued relationship: one value for every
/// target, or one value per target.
#[derive(Debug, Clone, PartialEq)]
pub enum PerTarget<T> {
    Broadcast(Option<T>),
    Each(Vec<Option<T>>),
}

impl<T> Default for PerTarget<T> {
    fn default() -> Self {
        Self::Broadcast(None)
    }
}

impl<T: Clone> PerTarget<T> {
    pub fn all(value: impl Into<T>) -> Self {
        Self::Broadcast(Some(value.into()))
    }

    pub fn each<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<T>,
    {
        Self::Each(values.into_iter().map(|v| Some(v.into())).collect())
    }

    fn expand(self, n: usize, what: &str) -> ModelResult<Vec<Option<T>>> {
        match self {
            Self::Broadcast(v) => Ok(vec![v; n]),
            Self::Each(values) if values.len() == n => Ok(values),
            Self::Each(values) => Err(ModelError::Validation {
                message: format!(
                    "expected {n} {what} values, one per relationship target, got {}",
                    values.len()
                ),
            }),
        }
    }
}

/// Metadata for a multi-valued Relationship.
#[derive(Debug, Clone, Default)]
pub struct MultiRelationshipOptions {
    pub observed_at: PerTarget<DateInput>,
    pub dataset_id: PerTarget<String>,
    pub userdata: PerTarget<Map>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl NgsiDocument {
    fn resolve_date(&mut self, input: DateInput) -> ModelResult<Temporal> {
        match input {
            DateInput::Auto => Ok(self.date_auto()),
            DateInput::Value(t) => Ok(t),
            DateInput::Text(text) => iso8601::parse(&text).ok_or(ModelError::DateFormat {
                value: text,
                found: "no ISO-8601 value".into(),
            }),
        }
    }

    /// Resolve `observedAt`: must be a full date-time. Caches the result.
    fn process_observed_at(&mut self, input: DateInput) -> ModelResult<String> {
        let date = self.resolve_date(input)?;
        if date.temporal_type() != TemporalType::DateTime {
            return Err(ModelError::DateFormat {
                value: date.to_iso(),
                found: date.temporal_type().to_string(),
            });
        }
        self.cache_date(date);
        Ok(date.to_iso())
    }

    fn apply_common_meta(
        &mut self,
        fragment: &mut Map,
        observed_at: Option<DateInput>,
        dataset_id: Option<&str>,
    ) -> ModelResult<()> {
        if let Some(at) = observed_at {
            let at = self.process_observed_at(at)?;
            fragment.insert(OBSERVED_AT.into(), at.into());
        }
        if let Some(id) = dataset_id {
            fragment.insert(DATASET_ID.into(), urn::prefix(id).into());
        }
        Ok(())
    }

    /// Build a Property fragment.
    pub fn build_property(
        &mut self,
        value: impl Into<AttrValue>,
        opts: PropertyOptions,
    ) -> ModelResult<Map> {
        let mut fragment = Map::new();
        fragment.insert(TYPE.into(), AttrType::Property.as_str().into());
        let value = match value.into() {
            AttrValue::Bool(b) => Value::Bool(b),
            AttrValue::Number(n) => Value::Number(n),
            AttrValue::List(l) => Value::Array(l),
            AttrValue::Map(m) => Value::Object(m),
            AttrValue::Text(s) if opts.escape => Value::String(url::escape(&s).into_owned()),
            AttrValue::Text(s) => Value::String(s),
            other => return Err(other.unmatched(AttrType::Property)),
        };
        fragment.insert(VALUE.into(), value);
        if let Some(code) = opts.unit_code {
            fragment.insert(UNIT_CODE.into(), code.into());
        }
        self.apply_common_meta(&mut fragment, opts.observed_at, opts.dataset_id.as_deref())?;
        if let Some(userdata) = opts.userdata {
            fragment.extend(userdata);
        }
        Ok(fragment)
    }

    /// Build a GeoProperty fragment.
    pub fn build_geoproperty(
        &mut self,
        value: impl Into<AttrValue>,
        opts: GeoOptions,
    ) -> ModelResult<Map> {
        let mut fragment = Map::new();
        fragment.insert(TYPE.into(), AttrType::GeoProperty.as_str().into());
        let geometry = match value.into() {
            AttrValue::Geometry(g) => g,
            AttrValue::LatLon(lat, lon) => Geometry::from_lat_lon(lat, lon),
            other => return Err(other.unmatched(AttrType::GeoProperty)),
        };
        fragment.insert(VALUE.into(), serde_json::to_value(geometry)?);
        self.apply_common_meta(&mut fragment, opts.observed_at, opts.dataset_id.as_deref())?;
        Ok(fragment)
    }

    /// Build a TemporalProperty fragment. Any temporal kind is accepted.
    pub fn build_temporal_property(&mut self, value: impl Into<DateInput>) -> ModelResult<Map> {
        let date = self.resolve_date(value.into())?;
        let mut fragment = Map::new();
        fragment.insert(TYPE.into(), AttrType::TemporalProperty.as_str().into());
        fragment.insert(
            VALUE.into(),
            json!({
                "@type": date.temporal_type().as_str(),
                "@value": date.to_iso(),
            }),
        );
        self.cache_date(date);
        Ok(fragment)
    }

    /// Build a single-valued Relationship fragment.
    pub fn build_relationship<T: EntityRef + ?Sized>(
        &mut self,
        target: &T,
        opts: RelationshipOptions,
    ) -> ModelResult<Map> {
        let mut fragment = Map::new();
        fragment.insert(TYPE.into(), AttrType::Relationship.as_str().into());
        fragment.insert(OBJECT.into(), urn::prefix(target.entity_id()).into());
        self.apply_common_meta(&mut fragment, opts.observed_at, opts.dataset_id.as_deref())?;
        // userdata rides along with datasetId only.
        if opts.dataset_id.is_some() {
            if let Some(userdata) = opts.userdata {
                fragment.extend(userdata);
            }
        }
        Ok(fragment)
    }

    /// Build one Relationship fragment per target.
    pub fn build_relationships<T: EntityRef>(
        &mut self,
        targets: &[T],
        opts: MultiRelationshipOptions,
    ) -> ModelResult<Vec<Value>> {
        let n = targets.len();
        let observed_at = opts.observed_at.expand(n, OBSERVED_AT)?;
        let dataset_id = opts.dataset_id.expand(n, DATASET_ID)?;
        let userdata = opts.userdata.expand(n, "userdata")?;

        let mut fragments = Vec::with_capacity(n);
        for (((target, observed_at), dataset_id), userdata) in
            targets.iter().zip(observed_at).zip(dataset_id).zip(userdata)
        {
            let opts = RelationshipOptions {
                observed_at,
                dataset_id,
                userdata,
            };
            fragments.push(Value::Object(self.build_relationship(target, opts)?));
        }
        Ok(fragments)
    }

    // -----------------------------------------------------------------------
    // Build-and-attach
    // -----------------------------------------------------------------------

    /// Build a Property and attach it under `name` (dotted names allowed).
    pub fn prop(
        &mut self,
        name: &str,
        value: impl Into<AttrValue>,
        opts: PropertyOptions,
    ) -> ModelResult<&Value> {
        let fragment = self.build_property(value, opts)?;
        self.attach(name, Value::Object(fragment))
    }

    /// Build a GeoProperty and attach it under `name`.
    pub fn gprop(
        &mut self,
        name: &str,
        value: impl Into<AttrValue>,
        opts: GeoOptions,
    ) -> ModelResult<&Value> {
        let fragment = self.build_geoproperty(value, opts)?;
        self.attach(name, Value::Object(fragment))
    }

    /// Build a TemporalProperty and attach it under `name`.
    pub fn tprop(&mut self, name: &str, value: impl Into<DateInput>) -> ModelResult<&Value> {
        let fragment = self.build_temporal_property(value)?;
        self.attach(name, Value::Object(fragment))
    }

    /// Build a Relationship and attach it under `name`.
    pub fn rel<T: EntityRef + ?Sized>(
        &mut self,
        name: &str,
        target: &T,
        opts: RelationshipOptions,
    ) -> ModelResult<&Value> {
        let fragment = self.build_relationship(target, opts)?;
        self.attach(name, Value::Object(fragment))
    }

    /// Build a multi-valued Relationship and attach the array under `name`.
    pub fn rels<T: EntityRef>(
        &mut self,
        name: &str,
        targets: &[T],
        opts: MultiRelationshipOptions,
    ) -> ModelResult<&Value> {
        let fragments = self.build_relationships(targets, opts)?;
        self.attach(name, Value::Array(fragments))
    }

    fn attach(&mut self, name: &str, value: Value) -> ModelResult<&Value> {
        self.set(name, value)?;
        self.get(name)
    }
}
