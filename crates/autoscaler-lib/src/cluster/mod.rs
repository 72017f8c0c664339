//! Cluster access layer
//!
//! A narrow capability trait over the Marathon REST API and the Mesos agent
//! statistics endpoint. All HTTP in this crate happens behind the trait so
//! tests can substitute an in-memory fake. None of the operations retry;
//! the control loop simply tries again on its next tick.

mod http;

pub use http::{ClusterConfig, HttpCluster};

use crate::error::Result;
use crate::models::{MarathonApp, MesosStat};

pub use async_trait::async_trait;

/// Capability set for talking to the cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// `GET /v2/apps`: all applications with id, instances, labels, tasks
    /// and version info populated.
    async fn list_apps(&self) -> Result<Vec<MarathonApp>>;

    /// `GET /v2/apps{id}` (the id already begins with `/`).
    async fn get_app(&self, id: &str) -> Result<MarathonApp>;

    /// `PUT /v2/apps{id}` with body `{"instances": n}`; 200 and 201 are
    /// both success.
    async fn set_instances(&self, id: &str, instances: u32) -> Result<()>;

    /// `GET http://{host}:{port}/monitor/statistics.json` on one agent.
    async fn task_statistics(&self, host: &str) -> Result<Vec<MesosStat>>;
}
