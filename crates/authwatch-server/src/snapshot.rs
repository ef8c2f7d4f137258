use anyhow::Context;
use async_trait::async_trait;
use authwatch_alert::MetricSnapshotProvider;
use authwatch_common::types::MetricSnapshot;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Fetches snapshots as JSON from an HTTP endpoint.
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("snapshot url must be http(s): {url}");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("authwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build snapshot HTTP client")?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MetricSnapshotProvider for HttpSnapshotProvider {
    async fn fetch(&self) -> anyhow::Result<MetricSnapshot> {
        let snapshot = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?
            .error_for_status()?
            .json::<MetricSnapshot>()
            .await
            .context("Snapshot body is not a valid metric snapshot")?;
        Ok(snapshot)
    }

    fn source_name(&self) -> &str {
        "http"
    }
}

/// Serves whatever snapshot was last stored. Starts empty.
#[derive(Default)]
pub struct StaticSnapshotProvider {
    snapshot: RwLock<MetricSnapshot>,
}

impl StaticSnapshotProvider {
    pub fn new(snapshot: MetricSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: MetricSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

#[async_trait]
impl MetricSnapshotProvider for StaticSnapshotProvider {
    async fn fetch(&self) -> anyhow::Result<MetricSnapshot> {
        Ok(self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}
