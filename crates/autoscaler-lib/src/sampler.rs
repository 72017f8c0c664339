//! Per-task statistics sampling
//!
//! CPU usage cannot be read from a single Mesos snapshot; the agent only
//! exposes cumulative user/system seconds. The sampler therefore takes two
//! snapshots a short gap apart and derives a rate, while memory is read
//! straight off the second snapshot. Per-task results are averaged into a
//! single per-tick sample for the application.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cluster::ClusterApi;
use crate::error::{AutoscalerError, Result};
use crate::models::{MesosStat, MesosStatistics, Sample, TaskRef};

/// Normalized usage for one task over one sampling gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskDelta {
    pub cpu: f64,
    pub mem: f64,
}

/// Samples all tasks of an application concurrently.
pub struct Sampler {
    cluster: Arc<dyn ClusterApi>,
    gap: Duration,
}

impl Sampler {
    pub fn new(cluster: Arc<dyn ClusterApi>, gap: Duration) -> Self {
        Self { cluster, gap }
    }

    /// Produces the application's per-tick sample: the arithmetic mean of
    /// every task that yielded a usable delta. Failing tasks are skipped;
    /// with no contributors the sample is `{0, 0}` and is still appended by
    /// the caller.
    pub async fn sample(&self, app_id: &str, tasks: &[TaskRef]) -> Sample {
        let deltas = join_all(tasks.iter().map(|task| self.task_delta(task))).await;

        let mut cpu = Vec::new();
        let mut mem = Vec::new();
        for (task, delta) in tasks.iter().zip(deltas) {
            match delta {
                Ok(Some(delta)) => {
                    cpu.push(delta.cpu);
                    mem.push(delta.mem);
                }
                Ok(None) => {
                    debug!(app_id, task_id = %task.id, "task yielded no usable delta");
                }
                Err(e) => {
                    warn!(app_id, task_id = %task.id, error = %e, "skipping task sample");
                }
            }
        }

        let sample = Sample {
            cpu: mean(&cpu),
            mem: mean(&mem),
        };
        debug!(app_id, cpu = sample.cpu, mem = sample.mem, "new sample");
        sample
    }

    /// Two snapshots spaced by the sampling gap, reduced to a delta.
    async fn task_delta(&self, task: &TaskRef) -> Result<Option<TaskDelta>> {
        let first = self.snapshot(task).await?;
        sleep(self.gap).await;
        let second = self.snapshot(task).await?;
        Ok(compute_delta(&first, &second))
    }

    async fn snapshot(&self, task: &TaskRef) -> Result<MesosStatistics> {
        let stats = self.cluster.task_statistics(&task.host).await?;
        find_task_stat(&task.id, stats)
    }
}

/// Locates the statistics row whose executor id matches the task.
pub fn find_task_stat(task_id: &str, stats: Vec<MesosStat>) -> Result<MesosStatistics> {
    stats
        .into_iter()
        .find(|stat| stat.executor_id == task_id)
        .map(|stat| stat.statistics)
        .ok_or_else(|| AutoscalerError::TaskNotFound(task_id.to_string()))
}

/// CPU% is the cumulative cpu-seconds delta over the timestamp delta;
/// memory% is rss over limit from the second snapshot. Returns `None` when
/// the snapshots are not usable (no time elapsed between them, or the task
/// has no memory limit).
pub fn compute_delta(first: &MesosStatistics, second: &MesosStatistics) -> Option<TaskDelta> {
    let time_delta = second.timestamp - first.timestamp;
    if time_delta <= 0.0 {
        return None;
    }
    if second.mem_limit_bytes == 0.0 {
        return None;
    }

    let first_cpu_total = first.cpus_user_time_secs + first.cpus_system_time_secs;
    let second_cpu_total = second.cpus_user_time_secs + second.cpus_system_time_secs;

    Some(TaskDelta {
        cpu: ((second_cpu_total - first_cpu_total) / time_delta) * 100.0,
        mem: (second.mem_rss_bytes / second.mem_limit_bytes) * 100.0,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
