//! Entity CRUD and query against the NGSI-LD `/entities` endpoint.
//!
//! Every operation follows the same shape: build a [`BrokerRequest`], send
//! it, hand the response to [`Broker::raise_for_status`] (or interpret the
//! status itself where NGSI-LD gives it a meaning, like 409 on create), then
//! decode. Requests are issued one after another; `update` and `upsert`
//! are delete-then-create and leave the entity briefly absent.

use serde_json::Value;

use super::broker::{Broker, BrokerRequest};
use super::error::{ApiError, ApiResult};
use crate::model::{Entity, EntityRef};

/// JSON-LD context link relation.
pub const JSONLD_CONTEXT: &str = "http://www.w3.org/ns/json-ld#context";

/// Response header carrying the total of a counted query.
pub const RESULTS_COUNT_HEADER: &str = "NGSILD-Results-Count";

/// Media type of NGSI-LD payloads.
pub const LD_JSON: &str = "application/ld+json";

/// What `create` does when the entity already exists (HTTP 409).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnConflict {
    /// Fail with [`ApiError::AlreadyExists`], unless the broker-wide
    /// `overwrite` flag is set.
    #[default]
    Fail,
    /// Return `None` without error.
    Skip,
    /// Replace the existing entity.
    Overwrite,
}

/// Filter for [`EntityService::query`] and [`EntityService::count`].
///
/// At least one of `entity_type` and `q` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    pub entity_type: Option<String>,
    pub q: Option<String>,
    pub ctx: Option<String>,
    /// Page size; 0 leaves it to the broker.
    pub limit: usize,
    pub offset: usize,
}

impl EntityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn q(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn ctx(mut self, ctx: impl Into<String>) -> Self {
        self.ctx = Some(ctx.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn filters(&self) -> ApiResult<Vec<(&'static str, &str)>> {
        let entity_type = self.entity_type.as_deref().filter(|s| !s.is_empty());
        let q = self.q.as_deref().filter(|s| !s.is_empty());
        if entity_type.is_none() && q.is_none() {
            return Err(ApiError::Validation {
                message: "must indicate at least a type or a query string".into(),
            });
        }
        let mut filters = Vec::with_capacity(2);
        if let Some(t) = entity_type {
            filters.push(("type", t));
        }
        if let Some(q) = q {
            filters.push(("q", q));
        }
        Ok(filters)
    }
}

/// Client for one broker's entities collection.
pub struct EntityService<B> {
    broker: B,
    url: String,
}

impl<B: Broker> EntityService<B> {
    /// `url` is the collection root, e.g. `http://localhost:1026/ngsi-ld/v1/entities`.
    pub fn new(broker: B, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self { broker, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    fn entity_url(&self, id: &str) -> String {
        format!("{}/{id}", self.url)
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Create an entity, failing if it exists (unless the broker-wide
    /// `overwrite` flag says otherwise).
    pub fn create<'e>(&self, entity: &'e Entity) -> ApiResult<Option<&'e Entity>> {
        self.create_with(entity, OnConflict::Fail)
    }

    /// Create an entity with an explicit conflict policy.
    ///
    /// Returns `Ok(None)` when the conflict was skipped, or when the broker
    /// omitted the Location header and `ignore_errors` is set.
    pub fn create_with<'e>(
        &self,
        entity: &'e Entity,
        on_conflict: OnConflict,
    ) -> ApiResult<Option<&'e Entity>> {
        self.post_entity(entity, on_conflict, true)
    }

    fn post_entity<'e>(
        &self,
        entity: &'e Entity,
        on_conflict: OnConflict,
        may_overwrite: bool,
    ) -> ApiResult<Option<&'e Entity>> {
        let request = BrokerRequest::post(format!("{}/", self.url))
            .header("Content-Type", LD_JSON)
            .json(Value::Object(entity.payload().clone()));
        let response = self.broker.send(request)?;

        if response.status == 409 {
            let overwrite = on_conflict == OnConflict::Overwrite || self.broker.overwrite();
            return match on_conflict {
                OnConflict::Skip => {
                    tracing::info!(id = entity.id(), "entity exists, skipped");
                    Ok(None)
                }
                _ if overwrite && may_overwrite => {
                    tracing::info!(id = entity.id(), "entity exists, overwriting");
                    self.replace(entity)
                }
                _ => Err(ApiError::AlreadyExists {
                    id: entity.id().to_string(),
                }),
            };
        }

        self.broker.raise_for_status(&response)?;

        let Some(location) = response.header("Location") else {
            if self.broker.ignore_errors() {
                tracing::warn!(id = entity.id(), "broker sent no Location header, ignored");
                return Ok(None);
            }
            return Err(ApiError::MissingLocationHeader {
                id: entity.id().to_string(),
            });
        };
        tracing::info!(status = response.status, location, "entity created");

        let returned = location.rsplit('/').next().unwrap_or(location);
        if returned != entity.id() {
            return Err(ApiError::IdentifierMismatch {
                expected: entity.id().to_string(),
                returned: returned.to_string(),
            });
        }
        Ok(Some(entity))
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    /// Fetch an entity. `ctx` is sent as the JSON-LD context link.
    pub fn get<E: EntityRef + ?Sized>(&self, eid: &E, ctx: Option<&str>) -> ApiResult<Entity> {
        let value = self.get_raw(eid, ctx)?;
        Ok(Entity::from_value(value)?)
    }

    /// Fetch an entity as the raw decoded JSON document.
    pub fn get_raw<E: EntityRef + ?Sized>(&self, eid: &E, ctx: Option<&str>) -> ApiResult<Value> {
        let mut request = BrokerRequest::get(self.entity_url(eid.entity_id())).header("Accept", LD_JSON);
        if let Some(ctx) = ctx {
            request = request.header("Link", context_link(ctx));
        }
        let response = self.broker.send(request)?;
        self.broker.raise_for_status(&response)?;
        response.json()
    }

    /// Whether the broker knows the entity.
    ///
    /// A failed lookup is `false`, not an error; so is a success whose body
    /// is not a JSON-LD document.
    pub fn exists<E: EntityRef + ?Sized>(&self, eid: &E) -> ApiResult<bool> {
        let request = BrokerRequest::get(self.entity_url(eid.entity_id())).header("Accept", LD_JSON);
        let response = self.broker.send(request)?;
        if !response.is_success() {
            return Ok(false);
        }
        let body: Value = match response.json() {
            Ok(body) => body,
            Err(_) => return Ok(false),
        };
        Ok(body.get("@context").is_some())
    }

    // -----------------------------------------------------------------------
    // Delete / replace
    // -----------------------------------------------------------------------

    /// Delete an entity; `true` when the broker confirmed.
    pub fn delete<E: EntityRef + ?Sized>(&self, eid: &E) -> ApiResult<bool> {
        let url = self.entity_url(eid.entity_id());
        tracing::info!(%url, "deleting entity");
        let response = self.broker.send(BrokerRequest::delete(url))?;
        self.broker.raise_for_status(&response)?;
        Ok(response.is_success())
    }

    /// Create, or delete and re-create if it already exists.
    pub fn upsert<'e>(&self, entity: &'e Entity) -> ApiResult<Option<&'e Entity>> {
        match self.create(entity) {
            Err(ApiError::AlreadyExists { .. }) => {
                self.delete(entity)?;
                self.create(entity)
            }
            other => other,
        }
    }

    /// Replace an entity by deleting and re-creating it.
    ///
    /// With `check_exists`, an entity the broker does not know is left
    /// alone and `None` is returned. This is not an attribute-level patch.
    pub fn update<'e>(
        &self,
        entity: &'e Entity,
        check_exists: bool,
    ) -> ApiResult<Option<&'e Entity>> {
        if check_exists && !self.exists(entity)? {
            return Ok(None);
        }
        self.replace(entity)
    }

    fn replace<'e>(&self, entity: &'e Entity) -> ApiResult<Option<&'e Entity>> {
        self.delete(entity)?;
        // A second conflict here means someone re-created it in between;
        // report it rather than looping.
        self.post_entity(entity, OnConflict::Fail, false)
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// Entities matching a type and/or NGSI-LD query expression.
    pub fn query(&self, query: &EntityQuery) -> ApiResult<Vec<Entity>> {
        let filters = query.filters()?;
        let mut request = BrokerRequest::get(self.url.clone()).header("Accept", LD_JSON);
        if query.limit != 0 {
            request = request.param("limit", query.limit);
        }
        if query.offset != 0 {
            request = request.param("offset", query.offset);
        }
        for (name, value) in filters {
            request = request.param(name, value);
        }
        if let Some(ctx) = &query.ctx {
            request = request.header("Link", context_link(ctx));
        }
        tracing::debug!(params = ?request.params, "querying entities");

        let response = self.broker.send(request)?;
        self.broker.raise_for_status(&response)?;
        let values: Vec<Value> = response.json()?;
        tracing::debug!(count = values.len(), "entities received");
        values
            .into_iter()
            .map(|v| Entity::from_value(v).map_err(ApiError::from))
            .collect()
    }

    /// Number of entities matching a type and/or query expression.
    ///
    /// Paging fields of `query` are ignored.
    pub fn count(&self, query: &EntityQuery) -> ApiResult<usize> {
        let filters = query.filters()?;
        let mut request = BrokerRequest::get(self.url.clone())
            .header("Accept", "application/json")
            .param("limit", 0)
            .param("count", "true");
        for (name, value) in filters {
            request = request.param(name, value);
        }
        if let Some(ctx) = &query.ctx {
            request = request.header("Link", context_link(ctx));
        }

        let response = self.broker.send(request)?;
        self.broker.raise_for_status(&response)?;
        let header = response
            .header(RESULTS_COUNT_HEADER)
            .ok_or_else(|| ApiError::Response {
                message: format!("missing {RESULTS_COUNT_HEADER} header"),
            })?;
        let count = header.trim().parse().map_err(|_| ApiError::Response {
            message: format!("invalid {RESULTS_COUNT_HEADER} header: {header:?}"),
        })?;
        tracing::debug!(count, "entities counted");
        Ok(count)
    }
}

/// `Link` header value pointing at a JSON-LD context.
pub fn context_link(ctx: &str) -> String {
    format!(r#"<{ctx}>; rel="{JSONLD_CONTEXT}"; type="{LD_JSON}""#)
}
