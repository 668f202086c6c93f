//! Entity service behaviour against a scripted in-process broker.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Value, json};

use ngsild_client::api::{
    ApiError, ApiResult, Broker, BrokerRequest, BrokerResponse, EntityQuery, EntityService,
    Method, OnConflict,
};
use ngsild_client::model::Entity;

const ROOT: &str = "http://broker/ngsi-ld/v1/entities";

// ---------------------------------------------------------------------------
// Fake broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBroker {
    script: Mutex<VecDeque<ApiResult<BrokerResponse>>>,
    sent: Mutex<Vec<BrokerRequest>>,
    overwrite: bool,
    ignore_errors: bool,
}

impl FakeBroker {
    fn new() -> Self {
        Self::default()
    }

    fn reply(self, status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(BrokerResponse {
            status,
            url: String::new(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }));
        self
    }

    fn fail(self, error: ApiError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    fn created(self, id: &str) -> Self {
        let location = format!("/ngsi-ld/v1/entities/{id}");
        self.reply(201, &[("Location", &location)], "")
    }

    fn sent(&self) -> Vec<BrokerRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn methods(&self) -> Vec<Method> {
        self.sent().iter().map(|r| r.method).collect()
    }
}

impl Broker for FakeBroker {
    fn send(&self, request: BrokerRequest) -> ApiResult<BrokerResponse> {
        let url = request.url.clone();
        self.sent.lock().unwrap().push(request);
        let mut next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request to {url}"))?;
        next.url = url;
        Ok(next)
    }

    fn overwrite(&self) -> bool {
        self.overwrite
    }

    fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }
}

fn service(broker: FakeBroker) -> EntityService<FakeBroker> {
    EntityService::new(broker, ROOT)
}

fn device() -> Entity {
    Entity::new("Device", "1")
}

fn problem(kind: &str) -> String {
    json!({"type": format!("https://uri.etsi.org/ngsi-ld/errors/{kind}"), "title": kind}).to_string()
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[test]
fn create_posts_payload_and_checks_location() {
    let svc = service(FakeBroker::new().created("urn:ngsi-ld:Device:1"));
    let entity = device();
    let created = svc.create(&entity).unwrap();
    assert_eq!(created.map(Entity::id), Some("urn:ngsi-ld:Device:1"));

    let sent = svc.broker().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Post);
    assert_eq!(sent[0].url, format!("{ROOT}/"));
    assert_eq!(sent[0].header_value("content-type"), Some("application/ld+json"));
    assert_eq!(sent[0].json.as_ref(), Some(&Value::Object(entity.payload().clone())));
}

#[test]
fn create_conflict_with_skip_returns_none() {
    let svc = service(FakeBroker::new().reply(409, &[], &problem("AlreadyExists")));
    let entity = device();
    let created = svc.create_with(&entity, OnConflict::Skip).unwrap();
    assert!(created.is_none());
    assert_eq!(svc.broker().methods(), [Method::Post]);
}

#[test]
fn create_conflict_without_policy_fails() {
    let svc = service(FakeBroker::new().reply(409, &[], &problem("AlreadyExists")));
    let err = svc.create(&device()).unwrap_err();
    assert!(matches!(err, ApiError::AlreadyExists { ref id } if id == "urn:ngsi-ld:Device:1"));
    assert_eq!(err.status(), Some(409));
}

#[test]
fn create_conflict_with_overwrite_replaces() {
    let svc = service(
        FakeBroker::new()
            .reply(409, &[], "")
            .reply(204, &[], "")
            .created("urn:ngsi-ld:Device:1"),
    );
    let entity = device();
    let created = svc.create_with(&entity, OnConflict::Overwrite).unwrap();
    assert!(created.is_some());
    assert_eq!(svc.broker().methods(), [Method::Post, Method::Delete, Method::Post]);
    assert_eq!(svc.broker().sent()[1].url, format!("{ROOT}/urn:ngsi-ld:Device:1"));
}

#[test]
fn broker_overwrite_flag_applies_by_default() {
    let broker = FakeBroker {
        overwrite: true,
        ..FakeBroker::new()
    }
    .reply(409, &[], "")
    .reply(204, &[], "")
    .created("urn:ngsi-ld:Device:1");
    let svc = service(broker);
    assert!(svc.create(&device()).unwrap().is_some());
    assert_eq!(svc.broker().methods(), [Method::Post, Method::Delete, Method::Post]);
}

#[test]
fn skip_wins_over_broker_overwrite() {
    let broker = FakeBroker {
        overwrite: true,
        ..FakeBroker::new()
    }
    .reply(409, &[], "");
    let svc = service(broker);
    assert!(svc.create_with(&device(), OnConflict::Skip).unwrap().is_none());
    assert_eq!(svc.broker().methods(), [Method::Post]);
}

#[test]
fn repeated_conflict_during_overwrite_does_not_loop() {
    let svc = service(
        FakeBroker::new()
            .reply(409, &[], "")
            .reply(204, &[], "")
            .reply(409, &[], ""),
    );
    let err = svc.create_with(&device(), OnConflict::Overwrite).unwrap_err();
    assert!(matches!(err, ApiError::AlreadyExists { .. }));
    assert_eq!(svc.broker().sent().len(), 3);
}

#[test]
fn missing_location_is_an_error() {
    let svc = service(FakeBroker::new().reply(201, &[], ""));
    let err = svc.create(&device()).unwrap_err();
    assert!(matches!(err, ApiError::MissingLocationHeader { .. }));
}

#[test]
fn missing_location_tolerated_with_ignore_errors() {
    let broker = FakeBroker {
        ignore_errors: true,
        ..FakeBroker::new()
    }
    .reply(201, &[], "");
    let svc = service(broker);
    assert!(svc.create(&device()).unwrap().is_none());
}

#[test]
fn location_mismatch_is_never_ignored() {
    let broker = FakeBroker {
        ignore_errors: true,
        ..FakeBroker::new()
    }
    .created("urn:ngsi-ld:Device:2");
    let svc = service(broker);
    let err = svc.create(&device()).unwrap_err();
    match err {
        ApiError::IdentifierMismatch { expected, returned } => {
            assert_eq!(expected, "urn:ngsi-ld:Device:1");
            assert_eq!(returned, "urn:ngsi-ld:Device:2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn create_server_error_carries_problem() {
    let svc = service(FakeBroker::new().reply(400, &[], &problem("BadRequestData")));
    let err = svc.create(&device()).unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.problem().and_then(|p| p.kind()), Some("BadRequestData"));
}

// ---------------------------------------------------------------------------
// get / exists / delete
// ---------------------------------------------------------------------------

#[test]
fn get_sends_context_link() {
    let body = json!({
        "@context": "https://example.org/ctx.jsonld",
        "id": "urn:ngsi-ld:Device:1",
        "type": "Device",
        "temperature": {"type": "Property", "value": 21.5}
    });
    let svc = service(FakeBroker::new().reply(200, &[], &body.to_string()));
    let entity = svc
        .get("urn:ngsi-ld:Device:1", Some("https://example.org/ctx.jsonld"))
        .unwrap();
    assert_eq!(entity.id(), "urn:ngsi-ld:Device:1");
    assert_eq!(entity.get("temperature.value").unwrap(), &json!(21.5));

    let sent = svc.broker().sent();
    assert_eq!(sent[0].method, Method::Get);
    assert_eq!(sent[0].url, format!("{ROOT}/urn:ngsi-ld:Device:1"));
    assert_eq!(sent[0].header_value("Accept"), Some("application/ld+json"));
    assert_eq!(
        sent[0].header_value("Link"),
        Some(
            r#"<https://example.org/ctx.jsonld>; rel="http://www.w3.org/ns/json-ld#context"; type="application/ld+json""#
        )
    );
}

#[test]
fn get_without_context_sends_no_link() {
    let body = json!({"id": "urn:ngsi-ld:Device:1", "type": "Device"});
    let svc = service(FakeBroker::new().reply(200, &[], &body.to_string()));
    svc.get("urn:ngsi-ld:Device:1", None).unwrap();
    assert_eq!(svc.broker().sent()[0].header_value("Link"), None);
}

#[test]
fn get_raw_keeps_the_document() {
    let body = json!({"id": "urn:ngsi-ld:Device:1", "type": "Device", "b": 1, "a": 2});
    let svc = service(FakeBroker::new().reply(200, &[], &body.to_string()));
    let raw = svc.get_raw("urn:ngsi-ld:Device:1", None).unwrap();
    let keys: Vec<_> = raw.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["id", "type", "b", "a"]);
}

#[test]
fn get_missing_entity_is_status_error() {
    let svc = service(FakeBroker::new().reply(404, &[], &problem("ResourceNotFound")));
    let err = svc.get("urn:ngsi-ld:Device:9", None).unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.problem().and_then(|p| p.kind()), Some("ResourceNotFound"));
}

#[test]
fn get_non_entity_body_is_model_error() {
    let svc = service(FakeBroker::new().reply(200, &[], r#"{"type": "Device"}"#));
    let err = svc.get("urn:ngsi-ld:Device:1", None).unwrap_err();
    assert!(matches!(err, ApiError::Model(_)));
}

#[test]
fn exists_needs_context_in_body() {
    let svc = service(
        FakeBroker::new()
            .reply(200, &[], r#"{"@context": [], "id": "urn:x", "type": "T"}"#)
            .reply(200, &[], r#"{"id": "urn:x", "type": "T"}"#)
            .reply(404, &[], &problem("ResourceNotFound"))
            .reply(200, &[], "not json"),
    );
    assert!(svc.exists("urn:x").unwrap());
    assert!(!svc.exists("urn:x").unwrap());
    assert!(!svc.exists("urn:x").unwrap());
    assert!(!svc.exists("urn:x").unwrap());
}

#[test]
fn exists_propagates_transport_errors() {
    let svc = service(FakeBroker::new().fail(ApiError::Transport {
        url: ROOT.into(),
        message: "connection refused".into(),
    }));
    assert!(matches!(svc.exists("urn:x"), Err(ApiError::Transport { .. })));
}

#[test]
fn delete_accepts_entity_or_id() {
    let svc = service(FakeBroker::new().reply(204, &[], "").reply(204, &[], ""));
    assert!(svc.delete(&device()).unwrap());
    assert!(svc.delete("urn:ngsi-ld:Device:1").unwrap());
    let sent = svc.broker().sent();
    assert!(sent.iter().all(|r| r.method == Method::Delete));
    assert!(sent.iter().all(|r| r.url == format!("{ROOT}/urn:ngsi-ld:Device:1")));
}

#[test]
fn delete_missing_entity_fails() {
    let svc = service(FakeBroker::new().reply(404, &[], &problem("ResourceNotFound")));
    assert_eq!(svc.delete("urn:ngsi-ld:Device:9").unwrap_err().status(), Some(404));
}

// ---------------------------------------------------------------------------
// upsert / update
// ---------------------------------------------------------------------------

#[test]
fn upsert_creates_when_absent() {
    let svc = service(FakeBroker::new().created("urn:ngsi-ld:Device:1"));
    assert!(svc.upsert(&device()).unwrap().is_some());
    assert_eq!(svc.broker().methods(), [Method::Post]);
}

#[test]
fn upsert_replaces_when_present() {
    let svc = service(
        FakeBroker::new()
            .reply(409, &[], "")
            .reply(204, &[], "")
            .created("urn:ngsi-ld:Device:1"),
    );
    assert!(svc.upsert(&device()).unwrap().is_some());
    assert_eq!(svc.broker().methods(), [Method::Post, Method::Delete, Method::Post]);
}

#[test]
fn update_skips_unknown_entity() {
    let svc = service(FakeBroker::new().reply(404, &[], ""));
    assert!(svc.update(&device(), true).unwrap().is_none());
    assert_eq!(svc.broker().methods(), [Method::Get]);
}

#[test]
fn update_replaces_known_entity() {
    let svc = service(
        FakeBroker::new()
            .reply(200, &[], r#"{"@context": [], "id": "urn:ngsi-ld:Device:1", "type": "Device"}"#)
            .reply(204, &[], "")
            .created("urn:ngsi-ld:Device:1"),
    );
    let entity = device();
    let updated = svc.update(&entity, true).unwrap();
    assert!(updated.is_some_and(|e| std::ptr::eq(e, &entity)));
    assert_eq!(svc.broker().methods(), [Method::Get, Method::Delete, Method::Post]);
}

#[test]
fn update_without_check_deletes_then_creates() {
    let svc = service(FakeBroker::new().reply(204, &[], "").created("urn:ngsi-ld:Device:1"));
    assert!(svc.update(&device(), false).unwrap().is_some());
    assert_eq!(svc.broker().methods(), [Method::Delete, Method::Post]);
}

// ---------------------------------------------------------------------------
// query / count
// ---------------------------------------------------------------------------

#[test]
fn query_without_filters_sends_nothing() {
    let svc = service(FakeBroker::new());
    let err = svc.query(&EntityQuery::new().limit(5)).unwrap_err();
    assert!(matches!(err, ApiError::Validation { .. }));
    assert!(matches!(svc.count(&EntityQuery::new()), Err(ApiError::Validation { .. })));
    assert!(svc.broker().sent().is_empty());
}

#[test]
fn query_sends_params_and_decodes_entities() {
    let body = json!([
        {"id": "urn:ngsi-ld:Device:1", "type": "Device"},
        {"id": "urn:ngsi-ld:Device:2", "type": "Device"}
    ]);
    let svc = service(FakeBroker::new().reply(200, &[], &body.to_string()));
    let found = svc
        .query(&EntityQuery::new().entity_type("Device").limit(10))
        .unwrap();
    let ids: Vec<_> = found.iter().map(Entity::id).collect();
    assert_eq!(ids, ["urn:ngsi-ld:Device:1", "urn:ngsi-ld:Device:2"]);

    let sent = &svc.broker().sent()[0];
    assert_eq!(sent.url, ROOT);
    assert_eq!(
        sent.params,
        [
            ("limit".to_string(), "10".to_string()),
            ("type".to_string(), "Device".to_string())
        ]
    );
    assert_eq!(sent.param_value("offset"), None);
}

#[test]
fn query_by_expression_with_context() {
    let svc = service(FakeBroker::new().reply(200, &[], "[]"));
    let found = svc
        .query(
            &EntityQuery::new()
                .q("temperature>20")
                .offset(20)
                .ctx("https://example.org/ctx.jsonld"),
        )
        .unwrap();
    assert!(found.is_empty());
    let sent = &svc.broker().sent()[0];
    assert_eq!(sent.param_value("q"), Some("temperature>20"));
    assert_eq!(sent.param_value("offset"), Some("20"));
    assert_eq!(sent.param_value("limit"), None);
    assert!(sent.header_value("Link").is_some());
}

#[test]
fn count_reads_results_header() {
    let svc = service(FakeBroker::new().reply(200, &[("NGSILD-Results-Count", "42")], "[]"));
    let n = svc.count(&EntityQuery::new().entity_type("Device")).unwrap();
    assert_eq!(n, 42);
    let sent = &svc.broker().sent()[0];
    assert_eq!(sent.param_value("limit"), Some("0"));
    assert_eq!(sent.param_value("count"), Some("true"));
    assert_eq!(sent.param_value("type"), Some("Device"));
    assert_eq!(sent.header_value("Accept"), Some("application/json"));
}

#[test]
fn count_without_header_is_response_error() {
    let svc = service(
        FakeBroker::new()
            .reply(200, &[], "[]")
            .reply(200, &[("NGSILD-Results-Count", "many")], "[]"),
    );
    let query = EntityQuery::new().q("x==1");
    assert!(matches!(svc.count(&query), Err(ApiError::Response { .. })));
    assert!(matches!(svc.count(&query), Err(ApiError::Response { .. })));
}
