//! HTTP state backend
//!
//! Applies seed mutations by POSTing them to the application backend, the
//! programmatic equivalent of `POST /login` instead of typing credentials
//! into the UI. A non-success response is a backend rejection, not a
//! harness failure.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use casekit_common::config::join_url;
use casekit_common::driver::{SeedOutcome, StateBackend, StateMutation};
use casekit_common::error::{Error, Result};

pub struct HttpStateBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStateBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }
}

#[async_trait]
impl StateBackend for HttpStateBackend {
    async fn apply(&self, mutation: &StateMutation) -> Result<SeedOutcome> {
        let url = self.endpoint_url(&mutation.endpoint);
        debug!(%url, "applying seed mutation");

        let response = self
            .client
            .post(&url)
            .json(&mutation.payload)
            .send()
            .await
            .map_err(|e| Error::RejectedByBackend(format!("transport: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
            let auth_token = body
                .get("token")
                .and_then(|v| v.as_str())
                .map(String::from);
            Ok(SeedOutcome::Applied { auth_token })
        } else {
            let text = response.text().await.unwrap_or_default();
            Ok(SeedOutcome::Rejected { reason: format!("{status}: {text}") })
        }
    }
}
