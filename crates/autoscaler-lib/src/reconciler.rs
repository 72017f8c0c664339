//! Top-level reconciliation loop
//!
//! Each tick: list applications, reconcile the managed set (adoptions,
//! removals, config-change re-adoptions), fan the per-app controller ticks
//! out concurrently, then sleep. The managed set is mutated only between
//! fan-outs; during a tick every application is moved into exactly one
//! spawned controller task and collected back afterwards.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cluster::ClusterApi;
use crate::controller::AppController;
use crate::models::{Application, MarathonApp};

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Sleep between ticks
    pub tick_interval: Duration,
    /// Gap between the two statistics snapshots per task
    pub sample_gap: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            sample_gap: Duration::from_secs(1),
        }
    }
}

/// Owns the managed-application set and drives the control loop.
pub struct Reconciler {
    cluster: Arc<dyn ClusterApi>,
    controller: Arc<AppController>,
    managed: HashMap<String, Application>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: ReconcilerConfig) -> Self {
        let controller = Arc::new(AppController::new(Arc::clone(&cluster), config.sample_gap));
        Self {
            cluster,
            controller,
            managed: HashMap::new(),
            config,
        }
    }

    /// Runs until the shutdown channel fires. In-flight ticks complete; the
    /// only externally visible mutation is the idempotent instance PUT, so
    /// abandoning state on exit is safe.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            "Starting reconciliation loop"
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = sleep(self.config.tick_interval) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down reconciliation loop");
                    break;
                }
            }
        }
    }

    /// One full pass: reconcile the managed set, then tick every app.
    pub async fn tick(&mut self) {
        match self.cluster.list_apps().await {
            Ok(all) => self.reconcile(all).await,
            Err(e) => {
                // Keep the previous managed set and still run the ticks.
                warn!(error = %e, "could not list applications, skipping reconciliation");
            }
        }

        self.fan_out().await;
    }

    async fn reconcile(&mut self, all: Vec<MarathonApp>) {
        let now = Utc::now().timestamp();
        let present: HashSet<&str> = all
            .iter()
            .filter(|app| app.instances > 0)
            .map(|app| app.id.as_str())
            .collect();

        let known: Vec<Application> = self.managed.drain().map(|(_, app)| app).collect();
        let mut retained: HashMap<String, Application> = HashMap::new();

        for mut app in known {
            if !present.contains(app.id.as_str()) {
                info!(app_id = %app.id, "application gone or scaled to zero, dropping");
                continue;
            }

            match self.cluster.get_app(&app.id).await {
                Ok(fresh) => {
                    app.refresh_from(&fresh);
                    if app.config_changed_since_adoption() {
                        // Dropped here; the adoption pass below picks the
                        // app back up with fresh policies and an empty
                        // sample buffer.
                        info!(app_id = %app.id, "configuration changed, re-adopting");
                        continue;
                    }
                }
                Err(e) => {
                    warn!(app_id = %app.id, error = %e, "could not refresh application, keeping as-is");
                }
            }

            retained.insert(app.id.clone(), app);
        }

        for candidate in all {
            if retained.contains_key(&candidate.id)
                || candidate.instances == 0
                || !candidate.is_scalable()
            {
                continue;
            }
            let app = self.adopt(candidate, now).await;
            retained.insert(app.id.clone(), app);
        }

        self.managed = retained;
    }

    async fn adopt(&self, discovered: MarathonApp, now: i64) -> Application {
        let mut app = Application::from_marathon(discovered, now);

        match self.cluster.get_app(&app.id).await {
            Ok(fresh) => app.refresh_from(&fresh),
            Err(e) => {
                warn!(app_id = %app.id, error = %e, "could not fetch details for adopted application");
            }
        }

        info!(
            app_id = %app.id,
            instances = app.instances,
            min = app.min,
            max = app.max,
            cooldown_secs = app.cooldown_secs,
            policies = app.policies.len(),
            "adopted application"
        );
        app
    }

    /// Copy-in/copy-out fan-out: each application is moved into its own
    /// task for the tick and reinserted when it returns.
    async fn fan_out(&mut self) {
        let apps: Vec<Application> = self.managed.drain().map(|(_, app)| app).collect();

        let mut handles = Vec::with_capacity(apps.len());
        for mut app in apps {
            let controller = Arc::clone(&self.controller);
            handles.push(tokio::spawn(async move {
                controller.tick(&mut app).await;
                app
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(app) => {
                    self.managed.insert(app.id.clone(), app);
                }
                // The app is lost from the set and re-adopted next tick.
                Err(e) => warn!(error = %e, "application tick panicked"),
            }
        }
    }
}
