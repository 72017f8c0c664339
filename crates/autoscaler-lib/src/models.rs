//! Core data models for the autoscaler
//!
//! Wire-format structs mirror the Marathon `/v2/apps` and Mesos agent
//! `/monitor/statistics.json` payloads. `Application` is the in-memory
//! record for one managed app, owned by the reconciler between ticks and
//! handed to exactly one controller during a tick.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::rules;

/// An application as listed by Marathon's `/v2/apps` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarathonApp {
    pub id: String,
    #[serde(default)]
    pub instances: u32,
    #[serde(default)]
    pub tasks: Vec<TaskRef>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, rename = "versionInfo")]
    pub version_info: VersionInfo,
}

impl MarathonApp {
    /// True iff the app opted into autoscaling via the `AUTOSCALABLE` label.
    pub fn is_scalable(&self) -> bool {
        rules::is_scalable(&self.labels)
    }
}

/// Envelope for `GET /v2/apps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarathonAppsResponse {
    pub apps: Vec<MarathonApp>,
}

/// Envelope for `GET /v2/apps{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarathonAppResponse {
    pub app: MarathonApp,
}

/// One running replica of an application, bound to an agent host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    #[serde(default, rename = "slaveId")]
    pub slave_id: String,
    #[serde(default)]
    pub host: String,
}

/// Marathon version metadata; both timestamps are RFC 3339 strings.
///
/// `lastScalingAt` is authoritative for cooldown checks; the controller
/// trusts the server's value over anything tracked locally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default, rename = "lastScalingAt")]
    pub last_scaling_at: String,
    #[serde(default, rename = "lastConfigChangeAt")]
    pub last_config_change_at: String,
}

/// One entry of the Mesos agent statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MesosStat {
    pub executor_id: String,
    pub statistics: MesosStatistics,
}

/// Raw counters reported by the agent; `timestamp` is in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MesosStatistics {
    #[serde(default)]
    pub cpus_limit: f64,
    #[serde(default)]
    pub cpus_system_time_secs: f64,
    #[serde(default)]
    pub cpus_user_time_secs: f64,
    #[serde(default)]
    pub mem_limit_bytes: f64,
    #[serde(default)]
    pub mem_rss_bytes: f64,
    #[serde(default)]
    pub timestamp: f64,
}

/// Per-tick aggregate of CPU% and memory% across an application's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub cpu: f64,
    pub mem: f64,
}

/// Which metric a scaling rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Memory,
}

impl Metric {
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "cpu" => Some(Metric::Cpu),
            "memory" => Some(Metric::Memory),
            _ => None,
        }
    }
}

/// Comparison applied to the windowed mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    LessThan,
}

impl Operator {
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "gt" => Some(Operator::GreaterThan),
            "lt" => Some(Operator::LessThan),
            _ => None,
        }
    }
}

/// Direction a triggered rule moves the desired instance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Increase,
    Decrease,
}

impl Action {
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "increase" => Some(Action::Increase),
            "decrease" => Some(Action::Decrease),
            _ => None,
        }
    }
}

/// A label-declared scaling rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub metric: Metric,
    pub threshold: f64,
    pub operator: Operator,
    pub samples: usize,
    pub interval: usize,
    pub action: Action,
    pub step: u32,
}

impl Policy {
    /// Number of recent samples this rule considers.
    pub fn window(&self) -> usize {
        self.samples * self.interval
    }
}

/// One Marathon application under autoscaler management.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: String,
    /// Observed replica count; updated locally only after a successful scale.
    pub instances: u32,
    /// The controller's target replica count.
    pub desired: u32,
    pub min: u32,
    pub max: u32,
    pub cooldown_secs: i64,
    pub tasks: Vec<TaskRef>,
    pub labels: HashMap<String, String>,
    pub policies: Vec<Policy>,
    /// Sliding sample buffer, oldest first.
    pub samples: VecDeque<Sample>,
    pub version_info: VersionInfo,
    /// Local wall-clock second at which this app entered the managed set.
    pub adopted_at: i64,
}

impl Application {
    /// Builds the managed record for a freshly discovered app: bounds and
    /// cooldown from labels (defaulting to the observed instance count and
    /// 300 s), desired set to observed, policies parsed, empty buffer.
    pub fn from_marathon(app: MarathonApp, adopted_at: i64) -> Self {
        let bounds = rules::scaling_bounds(&app.labels, app.instances);
        let policies = rules::sync_rules(&app.labels);
        Self {
            id: app.id,
            instances: app.instances,
            desired: app.instances,
            min: bounds.min,
            max: bounds.max,
            cooldown_secs: bounds.cooldown_secs,
            tasks: app.tasks,
            labels: app.labels,
            policies,
            samples: VecDeque::new(),
            version_info: app.version_info,
            adopted_at,
        }
    }

    pub fn is_scalable(&self) -> bool {
        rules::is_scalable(&self.labels)
    }

    /// Pulls the volatile parts of a `GET /v2/apps{id}` response into the
    /// managed record: the task set and the server-side version timestamps.
    pub fn refresh_from(&mut self, fresh: &MarathonApp) {
        self.tasks = fresh.tasks.clone();
        self.version_info = fresh.version_info.clone();
    }

    /// Appends the tick's sample and trims the front of the buffer to the
    /// retention cap.
    pub fn push_sample(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        let cap = self.sample_cap();
        while self.samples.len() > cap {
            self.samples.pop_front();
        }
    }

    /// Buffer cap: twice the widest policy window, so no policy's window is
    /// ever shortened by retention. Floor of one keeps the latest sample
    /// around for apps with no policies.
    pub fn sample_cap(&self) -> usize {
        self.policies
            .iter()
            .map(Policy::window)
            .max()
            .map(|w| w * 2)
            .unwrap_or(0)
            .max(1)
    }

    /// Seconds elapsed since Marathon last scaled this app. An absent or
    /// unparseable timestamp means the app was never scaled, which reads as
    /// an arbitrarily long elapsed time.
    pub fn seconds_since_last_scaling(&self, now: i64) -> i64 {
        match DateTime::parse_from_rfc3339(&self.version_info.last_scaling_at) {
            Ok(ts) => now - ts.timestamp(),
            Err(_) => i64::MAX,
        }
    }

    /// True when Marathon reports a configuration change newer than our
    /// adoption; the reconciler reacts by dropping and re-adopting.
    pub fn config_changed_since_adoption(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.version_info.last_config_change_at) {
            Ok(ts) => ts.timestamp() > self.adopted_at,
            Err(_) => false,
        }
    }
}
