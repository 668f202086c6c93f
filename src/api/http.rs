//! [`Broker`] over HTTP, backed by a blocking `ureq` agent.

use std::io::Read;
use std::time::Duration;

use super::broker::{Broker, BrokerRequest, BrokerResponse};
use super::entities::LD_JSON;
use super::error::{ApiError, ApiResult};
use crate::config::ClientConfig;

/// Header carrying the NGSI-LD tenant.
pub const TENANT_HEADER: &str = "NGSILD-Tenant";

/// HTTP connection to one broker.
///
/// The agent pools connections and is safe to share between threads.
pub struct HttpBroker {
    agent: ureq::Agent,
    default_headers: Vec<(String, String)>,
    overwrite: bool,
    ignore_errors: bool,
}

impl HttpBroker {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        let mut default_headers = vec![("Accept".to_string(), LD_JSON.to_string())];
        if let Some(tenant) = &config.tenant {
            default_headers.push((TENANT_HEADER.to_string(), tenant.clone()));
        }
        for (name, value) in &config.headers {
            default_headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            default_headers.push((name.clone(), value.clone()));
        }

        Self {
            agent,
            default_headers,
            overwrite: config.overwrite,
            ignore_errors: config.ignore_errors,
        }
    }

    /// Headers sent with every request unless overridden.
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    fn headers_for<'a>(&'a self, request: &'a BrokerRequest) -> Vec<(&'a str, &'a str)> {
        let mut headers: Vec<(&str, &str)> = self
            .default_headers
            .iter()
            .filter(|(name, _)| request.header_value(name).is_none())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        headers.extend(request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if request.json.is_some() && request.header_value("Content-Type").is_none() {
            headers.push(("Content-Type", LD_JSON));
        }
        headers
    }
}

impl Broker for HttpBroker {
    fn send(&self, request: BrokerRequest) -> ApiResult<BrokerResponse> {
        let mut req = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in self.headers_for(&request) {
            req = req.set(name, value);
        }
        for (name, value) in &request.params {
            req = req.query(name, value);
        }

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let result = match &request.json {
            Some(body) => req.send_json(body),
            None => req.call(),
        };

        match result {
            Ok(response) => into_broker_response(&request.url, response),
            // Non-2xx answers are still answers.
            Err(ureq::Error::Status(_, response)) => into_broker_response(&request.url, response),
            Err(ureq::Error::Transport(t)) => Err(ApiError::Transport {
                url: request.url,
                message: t.to_string(),
            }),
        }
    }

    fn overwrite(&self) -> bool {
        self.overwrite
    }

    fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }
}

fn into_broker_response(url: &str, response: ureq::Response) -> ApiResult<BrokerResponse> {
    let status = response.status();
    let headers = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name, value))
        })
        .collect();
    // `into_string` stops at 10 MB; large query results are legitimate.
    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| ApiError::Response {
            message: format!("failed to read body: {e}"),
        })?;
    Ok(BrokerResponse {
        status,
        url: url.to_string(),
        headers,
        body,
    })
}
