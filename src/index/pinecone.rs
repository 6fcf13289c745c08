//! HTTP client for a Pinecone-style managed vector index.
//!
//! Control-plane calls (`/indexes`) go to the configured controller URL.
//! Upserts go to the per-index data-plane host reported by the controller;
//! hosts are resolved on first use and cached per index name.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 0.5s, 1s, 2s, 4s, 8s, 16s (capped at 2^5)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::models::VectorRecord;

use super::{IndexDescription, IndexSpec, Metric, VectorIndex};

const API_VERSION: &str = "2024-07";
const API_KEY_ENV: &str = "PINECONE_API_KEY";

pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    controller_url: String,
    max_retries: u32,
    backoff_base: Duration,
    ready_timeout: Duration,
    ready_poll_interval: Duration,
    hosts: Mutex<HashMap<String, String>>,
}

impl PineconeIndex {
    pub fn new(
        api_key: impl Into<String>,
        controller_url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let api_key = api_key.into();
        anyhow::ensure!(!api_key.trim().is_empty(), "missing index API key");
        let controller_url = controller_url.into();
        anyhow::ensure!(
            controller_url.starts_with("http://") || controller_url.starts_with("https://"),
            "index controller URL must be an http(s) URL"
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build index HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            controller_url: controller_url.trim_end_matches('/').to_string(),
            max_retries,
            backoff_base: Duration::from_millis(500),
            ready_timeout: timeout * (max_retries + 1),
            ready_poll_interval: Duration::from_secs(1),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    /// Builds a client from `[index]` config and `PINECONE_API_KEY`.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", API_KEY_ENV))?;
        Self::new(
            api_key,
            config.controller_url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    /// Overrides the delay between retries and readiness polls.
    pub fn with_backoff(mut self, base: Duration, poll_interval: Duration) -> Self {
        self.backoff_base = base;
        self.ready_poll_interval = poll_interval;
        self
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Sends a request, retrying transient failures. Non-retryable statuses
    /// are returned to the caller unchanged.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tracing::debug!(what, attempt, ?delay, "retrying index request");
                tokio::time::sleep(delay).await;
            }

            match self.authed(build()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "{} failed ({}): {}",
                            what,
                            status,
                            body_text
                        ));
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    last_err = Some(anyhow::Error::new(e).context(format!("{} failed", what)));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", what)))
    }

    async fn data_plane_url(&self, index: &str) -> Result<String> {
        if let Some(host) = self.cached_host(index) {
            return Ok(host);
        }
        let description = self
            .describe_index(index)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Index '{}' not found", index))?;
        let host = description
            .host
            .ok_or_else(|| anyhow::anyhow!("Index '{}' has no data-plane host yet", index))?;
        let url = normalize_host(&host);
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.insert(index.to_string(), url.clone());
        }
        Ok(url)
    }

    fn cached_host(&self, index: &str) -> Option<String> {
        self.hosts.lock().ok().and_then(|h| h.get(index).cloned())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn error_for_status(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response.text().await.unwrap_or_default();
    bail!("{} failed ({}): {}", what, status, body_text)
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: usize,
    metric: Metric,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl From<IndexModel> for IndexDescription {
    fn from(model: IndexModel) -> Self {
        Self {
            name: model.name,
            dimension: model.dimension,
            metric: model.metric,
            host: model.host.filter(|h| !h.is_empty()),
            ready: model.status.map(|s| s.ready).unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: CloudRegion<'a>,
}

#[derive(Debug, Serialize)]
struct CloudRegion<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: usize,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.controller_url);
        let response = self
            .send_with_retry("list indexes", || self.client.get(&url))
            .await?;
        let list: IndexList = error_for_status("list indexes", response)
            .await?
            .json()
            .await
            .context("failed to parse index list")?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.controller_url, name);
        let response = self
            .send_with_retry("describe index", || self.client.get(&url))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let model: IndexModel = error_for_status("describe index", response)
            .await?
            .json()
            .await
            .context("failed to parse index description")?;
        Ok(Some(model.into()))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexDescription> {
        let region = spec.region.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Cannot create index '{}': no environment/region set (index.environment or PINECONE_ENVIRONMENT)",
                spec.name
            )
        })?;

        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: CloudRegion {
                    cloud: &spec.cloud,
                    region,
                },
            },
        };
        let url = format!("{}/indexes", self.controller_url);
        let response = self
            .send_with_retry("create index", || self.client.post(&url).json(&body))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::info!(index = %spec.name, "index already exists");
        } else {
            error_for_status("create index", response).await?;
        }

        self.wait_until_ready(&spec.name).await
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/vectors/upsert", self.data_plane_url(index).await?);
        let body = UpsertRequest {
            vectors: records,
            namespace,
        };
        let response = self
            .send_with_retry("upsert", || self.client.post(&url).json(&body))
            .await?;
        let parsed: UpsertResponse = error_for_status("upsert", response)
            .await?
            .json()
            .await
            .context("failed to parse upsert response")?;
        Ok(parsed.upserted_count)
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        let deadline = tokio::time::Instant::now() + self.ready_timeout;
        loop {
            if let Some(description) = self.describe_index(name).await? {
                if description.ready {
                    return Ok(description);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "Index '{}' was not ready after {:?}",
                    name,
                    self.ready_timeout
                );
            }
            tokio::time::sleep(self.ready_poll_interval).await;
        }
    }
}
