use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HealthStatus, StateStore, StoreError};

/// A networked keyed-value tier reached over a thin JSON-over-HTTP protocol:
///
/// - `PUT {base_url}/kv/{key}` with body `{ value, ttl_seconds }` for `set`
/// - `GET {base_url}/kv/{key}` returning `{ value }` or 404 for `get`
/// - `DELETE {base_url}/kv/{key}` returning 200/404 for `delete`
/// - `GET {base_url}/healthz` for `ping`/`health`
///
/// Stands in for a networked cache tier (e.g. Redis behind an HTTP proxy);
/// the protocol itself is not prescriptive, only the contract it must
/// satisfy.
pub struct RemoteStateStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SetRequest<'a> {
    value: &'a Value,
    ttl_seconds: u64,
}

#[derive(Deserialize)]
struct GetResponse {
    value: Value,
}

impl RemoteStateStore {
    /// Builds a remote store client pointed at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn kv_url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base_url, urlencoding_key(key))
    }
}

fn urlencoding_key(key: &str) -> String {
    // Keys are ASCII per the state-store contract; percent-encode the
    // characters the key layout (`job:{id}:task:{kind}`) actually uses.
    key.replace(':', "%3A")
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), StoreError> {
        let resp = self
            .client
            .put(self.kv_url(key))
            .json(&SetRequest {
                value: &value,
                ttl_seconds,
            })
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StoreError::Transport(format!(
                "set {key} failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let resp = self
            .client
            .get(self.kv_url(key))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(StoreError::Transport(format!(
                "get {key} failed: {}",
                resp.status()
            )));
        }
        let body: GetResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Some(body.value))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let resp = self
            .client
            .delete(self.kv_url(key))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(StoreError::Transport(format!("delete {key} failed: {s}"))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let resp = self
            .client
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Transport(format!("ping failed: {}", resp.status())))
        }
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: self.ping().await.is_ok(),
            backend: "remote",
            entry_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn set_and_get_round_trip_through_http() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/kv/job%3A1%3Atask%3Aliterature"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kv/job%3A1%3Atask%3Aliterature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": {"ok": true}})))
            .mount(&server)
            .await;

        let store = RemoteStateStore::new(server.uri());
        store
            .set("job:1:task:literature", json!({"ok": true}), 60)
            .await
            .unwrap();
        let got = store.get("job:1:task:literature").await.unwrap();
        assert_eq!(got, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kv/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = RemoteStateStore::new(server.uri());
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ping_reflects_health_endpoint_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = RemoteStateStore::new(server.uri());
        assert!(store.ping().await.is_ok());
    }
}
