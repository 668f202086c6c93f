//! Configured entry point: one broker connection plus its services.

use std::sync::Arc;

use super::entities::EntityService;
use super::http::HttpBroker;
use crate::config::ClientConfig;

/// A client bound to one broker.
///
/// ```no_run
/// use ngsild_client::api::{Client, EntityQuery};
/// use ngsild_client::config::ClientConfig;
///
/// let client = Client::new(ClientConfig::with_url("http://localhost:1026"));
/// let devices = client.entities().query(&EntityQuery::new().entity_type("Device")).unwrap();
/// println!("{} devices", devices.len());
/// ```
pub struct Client {
    config: ClientConfig,
    broker: Arc<HttpBroker>,
    entities: EntityService<Arc<HttpBroker>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let broker = Arc::new(HttpBroker::new(&config));
        let entities = EntityService::new(Arc::clone(&broker), config.entities_url());
        Self {
            config,
            broker,
            entities,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn broker(&self) -> &Arc<HttpBroker> {
        &self.broker
    }

    pub fn entities(&self) -> &EntityService<Arc<HttpBroker>> {
        &self.entities
    }
}
