//! Autoscaling engine for Marathon-on-Mesos container workloads
//!
//! This crate provides the core functionality for:
//! - Discovery and lifecycle of label-annotated applications
//! - Scaling policy parsing from Marathon labels
//! - Two-snapshot CPU/memory sampling against Mesos agents
//! - Sliding-window policy evaluation with cooldown hysteresis
//! - The top-level reconciliation loop issuing instance-count updates

pub mod cluster;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod reconciler;
pub mod rules;
pub mod sampler;

pub use cluster::{ClusterApi, ClusterConfig, HttpCluster};
pub use controller::AppController;
pub use error::{AutoscalerError, Result};
pub use models::*;
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use sampler::Sampler;
