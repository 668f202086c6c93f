//! `NgsiDocument`: the ordered JSON document every entity and attribute is
//! built into.
//!
//! Keys keep their insertion order (serde_json is built with
//! `preserve_order`), so what the builders declare is what goes on the
//! wire and to disk. Keys may be addressed with dotted paths:
//! `"temperature.observedAt"` is the `observedAt` member of the
//! `temperature` attribute.
//!
//! The document also carries the timestamp cache used to resolve
//! [`DateInput::Auto`](super::DateInput::Auto): the first automatic
//! timestamp is taken from the document's [`Clock`](crate::clock::Clock)
//! and every later `Auto` on the same document reuses it, so attributes
//! built together carry the same `observedAt`.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use super::error::{ModelError, ModelResult};
use crate::clock::{self, SharedClock};
use crate::iso8601::Temporal;

/// Ordered JSON object.
pub type Map = serde_json::Map<String, Value>;

/// Ordered, dotted-path addressable NGSI-LD document.
#[derive(Clone)]
pub struct NgsiDocument {
    map: Map,
    cached: Option<Temporal>,
    clock: SharedClock,
}

impl NgsiDocument {
    /// Empty document on the system clock, timestamp cache primed with "now".
    pub fn new() -> Self {
        Self::with_clock(clock::system())
    }

    /// Empty document on the given clock, timestamp cache primed from it.
    pub fn with_clock(clock: SharedClock) -> Self {
        let cached = Some(Temporal::DateTime(clock.now()));
        Self {
            map: Map::new(),
            cached,
            clock,
        }
    }

    /// Wrap an existing JSON object.
    pub fn from_map(map: Map) -> Self {
        let mut doc = Self::new();
        doc.map = map;
        doc
    }

    /// Replace the backing clock. The timestamp cache is left untouched.
    pub fn set_clock(&mut self, clock: SharedClock) {
        self.clock = clock;
    }

    // -----------------------------------------------------------------------
    // Timestamp cache
    // -----------------------------------------------------------------------

    /// The timestamp `Auto` would currently resolve to.
    pub fn cached_date(&self) -> Option<Temporal> {
        self.cached
    }

    /// Overwrite the timestamp cache.
    pub fn cache_date(&mut self, date: impl Into<Temporal>) {
        self.cached = Some(date.into());
    }

    /// Forget the cached timestamp; the next `Auto` asks the clock again.
    pub fn clear_cached_date(&mut self) {
        self.cached = None;
    }

    /// Resolve an automatic timestamp, filling the cache from the clock if empty.
    pub(crate) fn date_auto(&mut self) -> Temporal {
        *self
            .cached
            .get_or_insert_with(|| Temporal::DateTime(self.clock.now()))
    }

    // -----------------------------------------------------------------------
    // Dotted-path access
    // -----------------------------------------------------------------------

    /// Value at a dotted path.
    pub fn get(&self, path: &str) -> ModelResult<&Value> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((nested, key)) => (resolve_map(&self.map, nested, path)?, key),
            None => (&self.map, path),
        };
        parent.get(key).ok_or_else(|| lookup(path))
    }

    /// Mutable value at a dotted path.
    pub fn get_mut(&mut self, path: &str) -> ModelResult<&mut Value> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((nested, key)) => (resolve_map_mut(&mut self.map, nested, path)?, key),
            None => (&mut self.map, path),
        };
        parent.get_mut(key).ok_or_else(|| lookup(path))
    }

    /// Whether a dotted path resolves.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Insert or replace the value at a dotted path.
    ///
    /// All segments but the last must already resolve to nested mappings.
    /// Replacing an existing key keeps its position.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> ModelResult<()> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((nested, key)) => (resolve_map_mut(&mut self.map, nested, path)?, key),
            None => (&mut self.map, path),
        };
        parent.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Remove the value at a dotted path, returning it. Siblings keep their order.
    pub fn delete(&mut self, path: &str) -> ModelResult<Value> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((nested, key)) => (resolve_map_mut(&mut self.map, nested, path)?, key),
            None => (&mut self.map, path),
        };
        parent.shift_remove(key).ok_or_else(|| lookup(path))
    }

    // -----------------------------------------------------------------------
    // Plain map access
    // -----------------------------------------------------------------------

    /// Insert at the top level, without dotted-path interpretation.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.map.insert(key.into(), value.into())
    }

    pub fn as_map(&self) -> &Map {
        &self.map
    }

    pub fn into_map(self) -> Map {
        self.map
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.map.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // -----------------------------------------------------------------------
    // JSON
    // -----------------------------------------------------------------------

    // Serializing a `Map<String, Value>` cannot fail: keys are strings and
    // `Value` holds no non-finite floats.

    /// Compact JSON, declared key order, non-ASCII left unescaped.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.map).expect("a JSON object is always serializable")
    }

    /// Indented JSON (two spaces).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.map).expect("a JSON object is always serializable")
    }

    /// Parse a JSON object.
    pub fn from_json(payload: &str) -> ModelResult<Self> {
        let map: Map = serde_json::from_str(payload)?;
        Ok(Self::from_map(map))
    }

    /// Load a JSON object from a file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Save as indented JSON.
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        std::fs::write(path, self.to_json_pretty()).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Default for NgsiDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NgsiDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NgsiDocument")
            .field("map", &self.map)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

/// Structural equality: the timestamp cache and clock are not compared.
impl PartialEq for NgsiDocument {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl From<Map> for NgsiDocument {
    fn from(map: Map) -> Self {
        Self::from_map(map)
    }
}

impl From<NgsiDocument> for Value {
    fn from(doc: NgsiDocument) -> Self {
        Value::Object(doc.map)
    }
}

fn lookup(path: &str) -> ModelError {
    ModelError::Lookup {
        path: path.to_string(),
    }
}

fn resolve_map<'a>(root: &'a Map, nested: &str, path: &str) -> ModelResult<&'a Map> {
    let mut current = root;
    for segment in nested.split('.') {
        current = match current.get(segment) {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ModelError::NotADocument {
                    path: segment.to_string(),
                });
            }
            None => return Err(lookup(path)),
        };
    }
    Ok(current)
}

fn resolve_map_mut<'a>(root: &'a mut Map, nested: &str, path: &str) -> ModelResult<&'a mut Map> {
    let mut current = root;
    for segment in nested.split('.') {
        current = match current.get_mut(segment) {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ModelError::NotADocument {
                    path: segment.to_string(),
                });
            }
            None => return Err(lookup(path)),
        };
    }
    Ok(current)
}
