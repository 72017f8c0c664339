//! Service configuration
//!
//! Everything has a sensible in-cluster default; overrides come from
//! `AUTOSCALER_`-prefixed environment variables.

use anyhow::Result;
use serde::Deserialize;

/// Autoscaler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AutoscalerConfig {
    /// Marathon base URL
    #[serde(default = "default_marathon_url")]
    pub marathon_url: String,

    /// Port the Mesos agents expose `/monitor/statistics.json` on
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sleep between reconciliation ticks in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Gap between the two statistics snapshots per task in seconds
    #[serde(default = "default_sample_gap")]
    pub sample_gap_secs: u64,
}

fn default_marathon_url() -> String {
    "http://marathon.mesos:8080".to_string()
}

fn default_agent_port() -> u16 {
    5051
}

fn default_request_timeout() -> u64 {
    3
}

fn default_tick_interval() -> u64 {
    1
}

fn default_sample_gap() -> u64 {
    1
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            marathon_url: default_marathon_url(),
            agent_port: default_agent_port(),
            request_timeout_secs: default_request_timeout(),
            tick_interval_secs: default_tick_interval(),
            sample_gap_secs: default_sample_gap(),
        }
    }
}

impl AutoscalerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AUTOSCALER"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AutoscalerConfig::default();
        assert_eq!(config.marathon_url, "http://marathon.mesos:8080");
        assert_eq!(config.agent_port, 5051);
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.tick_interval_secs, 1);
        assert_eq!(config.sample_gap_secs, 1);
    }
}
