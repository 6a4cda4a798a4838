//! Home Assistant core REST API client.
//!
//! Covers the three endpoints the notifier needs: fire-and-forget
//! service calls, service discovery (to validate configured `notify.*`
//! targets) and state reads (to prime the reactive origins at startup).

use crate::config::HassConfig;
use crate::error::{NotifierError, Result};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// One entity state as returned by `GET /api/states`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Value,
}

#[derive(Debug, Deserialize)]
struct ServiceDomain {
    domain: String,
    #[serde(default)]
    services: Value,
}

/// Client for the Home Assistant core API, reached directly or through
/// the Supervisor proxy (`http://supervisor/core`).
#[derive(Debug, Clone)]
pub struct HaClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HaClient {
    /// Build a client from configuration. Fails when no token is
    /// available, since every core API endpoint requires one.
    pub fn new(config: &HassConfig, timeout: Duration) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or(NotifierError::MissingToken("HASS_TOKEN"))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Call a Home Assistant service, ignoring the response body.
    pub async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<()> {
        let url = format!("{}/api/services/{}/{}", self.base_url, domain, service);
        debug!("[API] POST {} {}", url, data);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifierError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }
        Ok(())
    }

    /// Service names available in the `notify` domain.
    pub async fn notify_services(&self) -> Result<HashSet<String>> {
        let url = format!("{}/api/services", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifierError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }
        let domains: Vec<ServiceDomain> = response.json().await?;
        Ok(domains
            .into_iter()
            .filter(|d| d.domain == "notify")
            .flat_map(|d| match d.services {
                Value::Object(map) => map.keys().cloned().collect::<Vec<_>>(),
                _ => vec![],
            })
            .collect())
    }

    /// All current entity states.
    pub async fn get_states(&self) -> Result<Vec<EntityState>> {
        let url = format!("{}/api/states", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifierError::UnexpectedStatus {
                url,
                status: response.status(),
            });
        }
        Ok(response.json().await?)
    }

    /// Websocket endpoint derived from the API base URL.
    pub fn websocket_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", self.base_url)
        };
        format!("{}/api/websocket", ws_base)
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
