//! HTTP implementation of the cluster capability trait
//!
//! Talks to Marathon at a configured base URL and to Mesos agents on their
//! statistics port. Requests are plain UTF-8 JSON with a short per-request
//! timeout and no internal retries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::ClusterApi;
use crate::error::{AutoscalerError, Result};
use crate::models::{
    MarathonApp, MarathonAppResponse, MarathonAppsResponse, MesosStat,
};

/// Configuration for the HTTP cluster client.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Marathon base URL (e.g. "http://marathon.mesos:8080")
    pub marathon_url: String,
    /// Port the Mesos agents expose statistics on
    pub agent_port: u16,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            marathon_url: "http://marathon.mesos:8080".to_string(),
            agent_port: 5051,
            request_timeout: Duration::from_secs(3),
        }
    }
}

/// Cluster client backed by a shared `reqwest` connection pool.
pub struct HttpCluster {
    http: Client,
    marathon_url: String,
    agent_port: u16,
}

impl HttpCluster {
    /// Create a new client. Fails on an invalid Marathon URL or if the
    /// underlying HTTP client cannot be built.
    pub fn new(config: ClusterConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        Url::parse(&config.marathon_url).context("Invalid Marathon URL")?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            marathon_url: config.marathon_url.trim_end_matches('/').to_string(),
            agent_port: config.agent_port,
        })
    }

    /// Marathon app ids begin with `/`, so the path is plain concatenation.
    fn app_url(&self, id: &str) -> String {
        format!("{}/v2/apps{}", self.marathon_url, id)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(AutoscalerError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AutoscalerError::HttpStatus(status));
        }

        let body = response.text().await.map_err(AutoscalerError::Network)?;
        serde_json::from_str(&body).map_err(AutoscalerError::Decode)
    }
}

#[async_trait]
impl ClusterApi for HttpCluster {
    async fn list_apps(&self) -> Result<Vec<MarathonApp>> {
        let url = format!("{}/v2/apps", self.marathon_url);
        let decoded: MarathonAppsResponse = self.get_json(&url).await?;
        Ok(decoded.apps)
    }

    async fn get_app(&self, id: &str) -> Result<MarathonApp> {
        let decoded: MarathonAppResponse = self.get_json(&self.app_url(id)).await?;
        Ok(decoded.app)
    }

    async fn set_instances(&self, id: &str, instances: u32) -> Result<()> {
        let response = self
            .http
            .put(self.app_url(id))
            .json(&serde_json::json!({ "instances": instances }))
            .send()
            .await
            .map_err(AutoscalerError::Network)?;

        // Marathon answers 200 for an in-place update and 201 for a
        // deployment; anything else is a failure.
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            Ok(())
        } else {
            Err(AutoscalerError::HttpStatus(status))
        }
    }

    async fn task_statistics(&self, host: &str) -> Result<Vec<MesosStat>> {
        let url = format!("http://{}:{}/monitor/statistics.json", host, self.agent_port);
        self.get_json(&url).await
    }
}
