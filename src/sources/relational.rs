// src/sources/relational.rs
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::sources::types::{BackendClient, BackendError, SourceResult, SourceStats};

pub const RELATIONAL_SOURCE_NAME: &str = "sqlite";

const USER_AGENT: &str = "storage-stats-aggregator/0.1";

/// Polls `GET {base_url}/status` on the relational storage service and passes the
/// JSON body through untouched.
#[derive(Clone)]
pub struct RelationalServiceClient {
    status_url: String,
    client: Client,
    timeout: Duration,
}

impl RelationalServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            status_url: format!("{}/status", base_url.trim_end_matches('/')),
            client: build_client(USER_AGENT, timeout),
            timeout,
        }
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    async fn try_fetch(&self) -> Result<serde_json::Value, BackendError> {
        let rsp = self
            .client
            .get(&self.status_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Transport(describe(&e)))?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(BackendError::UpstreamStatus(format!(
                "SQLite service returned status code {}",
                status.as_u16()
            )));
        }

        let bytes = rsp
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(describe(&e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Malformed(format!("SQLite service body is not JSON: {e}")))
    }
}

// Falls back to a default client; per-request `.timeout` still applies.
fn build_client(user_agent: &str, connect_timeout: Duration) -> Client {
    match Client::builder()
        .user_agent(user_agent)
        .connect_timeout(connect_timeout)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(source = RELATIONAL_SOURCE_NAME, error = %e, "http client build failed; using defaults without connect timeout");
            Client::new()
        }
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else {
        e.to_string()
    }
}

#[async_trait::async_trait]
impl BackendClient for RelationalServiceClient {
    async fn fetch_stats(&self) -> SourceResult {
        let res = self.try_fetch().await;
        if let Err(e) = &res {
            warn!(source = RELATIONAL_SOURCE_NAME, url = %self.status_url, kind = ?e.kind(), error = %e, "relational service unavailable");
        }
        res.map(SourceStats::Passthrough).into()
    }

    fn name(&self) -> &'static str {
        RELATIONAL_SOURCE_NAME
    }
}
