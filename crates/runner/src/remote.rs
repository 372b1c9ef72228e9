//! Remote driver bridge
//!
//! `RemoteDriver` adapts an automation bridge speaking a small JSON-over-
//! HTTP protocol (one endpoint per `DomDriver` operation) so the harness
//! can drive a real browser session out of process. The bridge scopes
//! state per session: the root driver talks to `session/*`, and each
//! session opened for a parallel worker gets its own `sessions/{id}/*`
//! namespace. Transport failures map to `DriverUnavailable`, which aborts
//! the run.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use casekit_common::config::join_url;
use casekit_common::driver::{CookieJar, DomDriver, StorageEntries};
use casekit_common::error::{Error, Result};
use casekit_common::selector::{ElementHandle, SelectorDescriptor};

use crate::intercept::{AliasRegistry, InterceptedRequest};

pub struct RemoteDriver {
    client: reqwest::Client,
    bridge_url: String,
    session_path: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    handles: Vec<ElementHandle>,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
}

impl RemoteDriver {
    pub fn new(bridge_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            bridge_url: bridge_url.into(),
            session_path: "session".into(),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.bridge_url, path)
    }

    fn session_endpoint(&self, tail: &str) -> String {
        format!("{}/{}", self.session_path, tail)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::DriverUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::DriverUnavailable(format!(
                "bridge returned {} for {}",
                response.status(),
                path
            )));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| Error::DriverUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::DriverUnavailable(format!(
                "bridge returned {} for {}",
                response.status(),
                path
            )));
        }
        response.json().await.map_err(|e| Error::DriverUnavailable(e.to_string()))
    }

    /// Drain intercepted requests from this driver's session into the
    /// alias registry. Spawned alongside a run; exits when the bridge
    /// goes away.
    pub async fn pump_events(self: Arc<Self>, registry: Arc<AliasRegistry>) {
        loop {
            let events: Vec<InterceptedRequest> =
                match self.get_json(&self.session_endpoint("events/drain")).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("event pump stopped: {}", e);
                        return;
                    }
                };
            for event in events {
                registry.record(event);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[async_trait]
impl DomDriver for RemoteDriver {
    async fn visit(&self, url: &str) -> Result<()> {
        debug!(%url, "bridge visit");
        self.post(&self.session_endpoint("visit"), json!({ "url": url })).await?;
        Ok(())
    }

    async fn query(
        &self,
        descriptor: &SelectorDescriptor,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        let response = self
            .post(
                &self.session_endpoint("query"),
                json!({
                    "kind": descriptor.kind,
                    "value": descriptor.value,
                    "scope": scope.map(|h| h.id),
                }),
            )
            .await?;
        let parsed: QueryResponse =
            response.json().await.map_err(|e| Error::DriverUnavailable(e.to_string()))?;
        Ok(parsed.handles)
    }

    async fn dispatch_event(&self, target: &ElementHandle, event: &str) -> Result<()> {
        self.post(
            &self.session_endpoint("dispatch"),
            json!({ "target": target.id, "event": event }),
        )
        .await?;
        Ok(())
    }

    async fn read_cookies(&self) -> Result<CookieJar> {
        self.get_json(&self.session_endpoint("cookies")).await
    }

    async fn write_cookies(&self, cookies: &CookieJar) -> Result<()> {
        self.post(&self.session_endpoint("cookies"), serde_json::to_value(cookies)?).await?;
        Ok(())
    }

    async fn read_storage(&self) -> Result<StorageEntries> {
        self.get_json(&self.session_endpoint("storage")).await
    }

    async fn write_storage(&self, entries: &StorageEntries) -> Result<()> {
        self.post(&self.session_endpoint("storage"), serde_json::to_value(entries)?).await?;
        Ok(())
    }

    async fn open_session(&self) -> Result<Arc<dyn DomDriver>> {
        let response = self.post("sessions/open", json!({})).await?;
        let parsed: SessionResponse =
            response.json().await.map_err(|e| Error::DriverUnavailable(e.to_string()))?;
        debug!(session = %parsed.id, "bridge session opened");
        Ok(Arc::new(Self {
            client: self.client.clone(),
            bridge_url: self.bridge_url.clone(),
            session_path: format!("sessions/{}", parsed.id),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.get_json::<serde_json::Value>("health").await.map(|_| ())
    }
}
