//! Label-driven scaling rules
//!
//! Operators declare policy entirely through Marathon app labels:
//! `AUTOSCALABLE` opts an app in, `AUTOSCALING_MIN_INSTANCES` /
//! `AUTOSCALING_MAX_INSTANCES` / `AUTOSCALING_COOLDOWN_PERIOD` bound the
//! controller, and up to ten numbered rules
//! (`AUTOSCALING_{0-9}_RULE_{TYPE,THRESHOLD,SAMPLES,INTERVAL,ACTION,OPERATOR,STEP}`)
//! describe when and how to move the instance count. A rule is emitted only
//! when all of its required labels are present and parseable.

use std::collections::HashMap;
use tracing::warn;

use crate::error::{AutoscalerError, Result};
use crate::models::{Action, Metric, Operator, Policy};

/// Opt-in label; presence with any value marks an app as scalable.
pub const OPT_IN_LABEL: &str = "AUTOSCALABLE";

const MIN_LABEL: &str = "AUTOSCALING_MIN_INSTANCES";
const MAX_LABEL: &str = "AUTOSCALING_MAX_INSTANCES";
const COOLDOWN_LABEL: &str = "AUTOSCALING_COOLDOWN_PERIOD";

const DEFAULT_COOLDOWN_SECS: i64 = 300;
const DEFAULT_STEP: u32 = 1;

/// Scaling bounds and cooldown extracted from an app's labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingBounds {
    pub min: u32,
    pub max: u32,
    pub cooldown_secs: i64,
}

pub fn is_scalable(labels: &HashMap<String, String>) -> bool {
    labels.contains_key(OPT_IN_LABEL)
}

/// Reads min/max/cooldown from labels. Missing or unparseable min and max
/// default to the instance count observed at adoption; missing cooldown
/// defaults to 300 seconds (5 minutes).
pub fn scaling_bounds(labels: &HashMap<String, String>, instances: u32) -> ScalingBounds {
    let min = bound_label(labels, MIN_LABEL).unwrap_or(instances);
    let mut max = bound_label(labels, MAX_LABEL).unwrap_or(instances);

    if min > max {
        warn!(min, max, "min instances exceeds max, raising max to min");
        max = min;
    }

    let cooldown_secs = match labels.get(COOLDOWN_LABEL) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(value = %raw, "ignoring unparseable cooldown label");
            DEFAULT_COOLDOWN_SECS
        }),
        None => DEFAULT_COOLDOWN_SECS,
    };

    ScalingBounds {
        min,
        max,
        cooldown_secs,
    }
}

/// Extracts the policy set from an app's labels, overwriting whatever was
/// synced before. Incomplete rule numbers are skipped; rules with values
/// that fail to parse are dropped with a warning.
pub fn sync_rules(labels: &HashMap<String, String>) -> Vec<Policy> {
    let mut policies = Vec::new();
    for digit in 0..10u8 {
        match rule_from_labels(labels, digit) {
            Ok(Some(policy)) => policies.push(policy),
            Ok(None) => {}
            Err(e) => warn!(rule = digit, error = %e, "dropping unparseable scaling rule"),
        }
    }
    policies
}

fn rule_from_labels(labels: &HashMap<String, String>, digit: u8) -> Result<Option<Policy>> {
    let label = |suffix: &str| format!("AUTOSCALING_{digit}_RULE_{suffix}");

    let (Some(metric), Some(threshold), Some(samples), Some(interval), Some(action), Some(operator)) = (
        labels.get(&label("TYPE")),
        labels.get(&label("THRESHOLD")),
        labels.get(&label("SAMPLES")),
        labels.get(&label("INTERVAL")),
        labels.get(&label("ACTION")),
        labels.get(&label("OPERATOR")),
    ) else {
        return Ok(None);
    };

    let metric = Metric::from_label(metric)
        .ok_or_else(|| invalid(label("TYPE"), "rule type (cpu or memory)", metric))?;
    let operator = Operator::from_label(operator)
        .ok_or_else(|| invalid(label("OPERATOR"), "operator (gt or lt)", operator))?;
    let action = Action::from_label(action)
        .ok_or_else(|| invalid(label("ACTION"), "action (increase or decrease)", action))?;
    let threshold: f64 = threshold
        .parse()
        .map_err(|_| invalid(label("THRESHOLD"), "floating-point threshold", threshold))?;
    let samples = positive(&label("SAMPLES"), samples)?;
    let interval = positive(&label("INTERVAL"), interval)?;
    let step = match labels.get(&label("STEP")) {
        Some(raw) => positive(&label("STEP"), raw)? as u32,
        None => DEFAULT_STEP,
    };

    Ok(Some(Policy {
        metric,
        threshold,
        operator,
        samples,
        interval,
        action,
        step,
    }))
}

fn positive(name: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(invalid(name.to_string(), "positive integer", value)),
    }
}

fn invalid(name: impl Into<String>, expected: &'static str, value: &str) -> AutoscalerError {
    AutoscalerError::InvalidLabel {
        name: name.into(),
        expected,
        value: value.to_string(),
    }
}

fn bound_label(labels: &HashMap<String, String>, name: &str) -> Option<u32> {
    let raw = labels.get(name)?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(label = name, value = %raw, "ignoring unparseable bound label");
            None
        }
    }
}
