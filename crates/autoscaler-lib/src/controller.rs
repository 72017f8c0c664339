//! Per-application control flow for one reconciliation tick
//!
//! Order matters and is strictly sequential for one application: re-sync
//! rules from labels, append exactly one sample, calibrate the desired
//! count, and finally adapt. Scaling is rate-limited by the app's cooldown
//! against the `lastScalingAt` timestamp Marathon reports.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cluster::ClusterApi;
use crate::error::Result;
use crate::evaluator;
use crate::models::Application;
use crate::rules;
use crate::sampler::Sampler;

/// Drives sample -> evaluate -> adapt for single applications.
pub struct AppController {
    cluster: Arc<dyn ClusterApi>,
    sampler: Sampler,
}

impl AppController {
    pub fn new(cluster: Arc<dyn ClusterApi>, sample_gap: Duration) -> Self {
        let sampler = Sampler::new(Arc::clone(&cluster), sample_gap);
        Self { cluster, sampler }
    }

    /// One tick for one application. Never fails; every error is logged and
    /// the app is left in a state the next tick can continue from.
    pub async fn tick(&self, app: &mut Application) {
        app.policies = rules::sync_rules(&app.labels);

        let sample = self.sampler.sample(&app.id, &app.tasks).await;
        app.push_sample(sample);

        evaluator::calibrate_desired(app);

        if app.desired != app.instances {
            self.adapt(app).await;
        }
    }

    async fn adapt(&self, app: &mut Application) {
        if let Err(e) = self.scale(app).await {
            warn!(app_id = %app.id, error = %e, "scaling request failed");
        }
    }

    /// Issues the instance-count update unless the app is still cooling
    /// down. On success the local observed count follows the desired one;
    /// `lastScalingAt` itself is refreshed from Marathon on the next
    /// reconcile.
    async fn scale(&self, app: &mut Application) -> Result<()> {
        let elapsed = app.seconds_since_last_scaling(Utc::now().timestamp());
        if elapsed < app.cooldown_secs {
            info!(
                app_id = %app.id,
                elapsed_secs = elapsed,
                cooldown_secs = app.cooldown_secs,
                "within cooldown, holding instance count"
            );
            return Ok(());
        }

        self.cluster.set_instances(&app.id, app.desired).await?;
        info!(app_id = %app.id, instances = app.desired, "scaled application");
        app.instances = app.desired;
        Ok(())
    }
}
