//! Sliding-window policy evaluation
//!
//! A policy looks at the last `samples x interval` samples of its metric
//! and compares the windowed mean against its threshold. Calibration walks
//! every policy once per tick and nudges the desired instance count, gated
//! so that two same-direction rules cannot compound within a single tick
//! while an opposing rule may still pull the count back.

use tracing::{debug, info};

use crate::models::{Action, Application, Metric, Operator, Policy, Sample};

/// Windowed mean of the policy's metric, or `None` while the buffer has
/// fewer samples than the window requires.
pub fn windowed_mean(policy: &Policy, samples: &std::collections::VecDeque<Sample>) -> Option<f64> {
    let window = policy.window();
    if window == 0 || samples.len() < window {
        return None;
    }

    let total: f64 = samples
        .iter()
        .rev()
        .take(window)
        .map(|sample| match policy.metric {
            Metric::Cpu => sample.cpu,
            Metric::Memory => sample.mem,
        })
        .sum();
    Some(total / window as f64)
}

/// True when the policy's window is full and its mean crosses the threshold.
pub fn triggers(policy: &Policy, samples: &std::collections::VecDeque<Sample>) -> bool {
    let Some(mean) = windowed_mean(policy, samples) else {
        debug!(
            have = samples.len(),
            need = policy.window(),
            "window not full, skipping rule"
        );
        return false;
    };

    match policy.operator {
        Operator::GreaterThan => mean > policy.threshold,
        Operator::LessThan => mean < policy.threshold,
    }
}

/// Applies every triggering policy to `desired`, clamped to `[min, max]`.
///
/// The `desired <= instances` / `desired >= instances` gates mean the first
/// rule to move past the current instance count wins its direction for the
/// tick; later same-direction rules are suppressed, while an opposite rule
/// may still net the count back toward the current level.
pub fn calibrate_desired(app: &mut Application) {
    for policy in &app.policies {
        if !triggers(policy, &app.samples) {
            continue;
        }

        match policy.action {
            Action::Increase => {
                if app.desired <= app.instances && app.desired < app.max {
                    app.desired = (app.desired + policy.step).min(app.max);
                    info!(
                        app_id = %app.id,
                        desired = app.desired,
                        instances = app.instances,
                        "scale-up rule raised desired instance count"
                    );
                }
            }
            Action::Decrease => {
                if app.desired >= app.instances && app.desired > app.min {
                    app.desired = app.desired.saturating_sub(policy.step).max(app.min);
                    info!(
                        app_id = %app.id,
                        desired = app.desired,
                        instances = app.instances,
                        "scale-down rule lowered desired instance count"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VersionInfo;
    use std::collections::{HashMap, VecDeque};

    fn policy(
        metric: Metric,
        operator: Operator,
        threshold: f64,
        samples: usize,
        action: Action,
        step: u32,
    ) -> Policy {
        Policy {
            metric,
            threshold,
            operator,
            samples,
            interval: 1,
            action,
            step,
        }
    }

    fn app(instances: u32, min: u32, max: u32, policies: Vec<Policy>) -> Application {
        Application {
            id: "/web".to_string(),
            instances,
            desired: instances,
            min,
            max,
            cooldown_secs: 300,
            tasks: Vec::new(),
            labels: HashMap::new(),
            policies,
            samples: VecDeque::new(),
            version_info: VersionInfo::default(),
            adopted_at: 0,
        }
    }

    fn push_cpu(app: &mut Application, values: &[f64]) {
        for &cpu in values {
            app.samples.push_back(Sample { cpu, mem: 0.0 });
        }
    }

    fn push_mem(app: &mut Application, values: &[f64]) {
        for &mem in values {
            app.samples.push_back(Sample { cpu: 0.0, mem });
        }
    }

    #[test]
    fn test_policy_skipped_until_window_full() {
        let rule = policy(
            Metric::Cpu,
            Operator::GreaterThan,
            80.0,
            3,
            Action::Increase,
            1,
        );
        let mut buffer = VecDeque::new();
        buffer.push_back(Sample { cpu: 95.0, mem: 0.0 });
        buffer.push_back(Sample { cpu: 95.0, mem: 0.0 });
        assert!(!triggers(&rule, &buffer));

        buffer.push_back(Sample { cpu: 95.0, mem: 0.0 });
        assert!(triggers(&rule, &buffer));
    }

    #[test]
    fn test_window_accounts_for_interval() {
        let mut rule = policy(
            Metric::Cpu,
            Operator::GreaterThan,
            80.0,
            2,
            Action::Increase,
            1,
        );
        rule.interval = 3;

        let mut buffer = VecDeque::new();
        for _ in 0..5 {
            buffer.push_back(Sample { cpu: 95.0, mem: 0.0 });
        }
        assert!(!triggers(&rule, &buffer));
        buffer.push_back(Sample { cpu: 95.0, mem: 0.0 });
        assert!(triggers(&rule, &buffer));
    }

    #[test]
    fn test_mean_uses_most_recent_samples() {
        let rule = policy(
            Metric::Cpu,
            Operator::GreaterThan,
            80.0,
            2,
            Action::Increase,
            1,
        );
        let mut buffer = VecDeque::new();
        // Old idle samples must not dilute the recent window.
        for cpu in [1.0, 1.0, 1.0, 90.0, 90.0] {
            buffer.push_back(Sample { cpu, mem: 0.0 });
        }
        assert!(triggers(&rule, &buffer));
    }

    #[test]
    fn test_lt_operator_triggers_below_threshold() {
        let rule = policy(
            Metric::Memory,
            Operator::LessThan,
            10.0,
            2,
            Action::Decrease,
            1,
        );
        let mut buffer = VecDeque::new();
        buffer.push_back(Sample { cpu: 0.0, mem: 5.0 });
        buffer.push_back(Sample { cpu: 0.0, mem: 5.0 });
        assert!(triggers(&rule, &buffer));

        buffer.push_back(Sample { cpu: 0.0, mem: 50.0 });
        buffer.push_back(Sample { cpu: 0.0, mem: 50.0 });
        assert!(!triggers(&rule, &buffer));
    }

    #[test]
    fn test_cpu_scale_up() {
        let mut app = app(
            2,
            1,
            5,
            vec![policy(
                Metric::Cpu,
                Operator::GreaterThan,
                80.0,
                3,
                Action::Increase,
                1,
            )],
        );
        push_cpu(&mut app, &[85.0, 85.0, 85.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 3);
    }

    #[test]
    fn test_memory_scale_down_blocked_at_min() {
        let mut app = app(
            2,
            2,
            5,
            vec![policy(
                Metric::Memory,
                Operator::LessThan,
                10.0,
                2,
                Action::Decrease,
                2,
            )],
        );
        push_mem(&mut app, &[5.0, 5.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 2);
    }

    #[test]
    fn test_step_clamped_to_max() {
        let mut app = app(
            2,
            1,
            3,
            vec![policy(
                Metric::Cpu,
                Operator::GreaterThan,
                80.0,
                1,
                Action::Increase,
                5,
            )],
        );
        push_cpu(&mut app, &[95.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 3);
    }

    #[test]
    fn test_step_clamped_to_min() {
        let mut app = app(
            4,
            2,
            6,
            vec![policy(
                Metric::Cpu,
                Operator::LessThan,
                10.0,
                1,
                Action::Decrease,
                5,
            )],
        );
        push_cpu(&mut app, &[1.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 2);
    }

    #[test]
    fn test_same_direction_rules_do_not_compound() {
        let up = policy(
            Metric::Cpu,
            Operator::GreaterThan,
            80.0,
            1,
            Action::Increase,
            1,
        );
        let mut app = app(2, 1, 5, vec![up.clone(), up]);
        push_cpu(&mut app, &[95.0]);

        calibrate_desired(&mut app);
        // The second rule sees desired > instances and is suppressed.
        assert_eq!(app.desired, 3);
    }

    #[test]
    fn test_opposing_rule_nets_back() {
        let up = policy(
            Metric::Cpu,
            Operator::GreaterThan,
            80.0,
            1,
            Action::Increase,
            1,
        );
        let down = policy(
            Metric::Memory,
            Operator::LessThan,
            50.0,
            1,
            Action::Decrease,
            1,
        );
        let mut app = app(2, 1, 5, vec![up, down]);
        app.samples.push_back(Sample {
            cpu: 95.0,
            mem: 5.0,
        });

        calibrate_desired(&mut app);
        // Up moves desired to 3, down nets it back to 2.
        assert_eq!(app.desired, 2);
    }

    #[test]
    fn test_short_window_leaves_desired_unchanged() {
        let mut app = app(
            2,
            1,
            5,
            vec![policy(
                Metric::Cpu,
                Operator::GreaterThan,
                80.0,
                5,
                Action::Increase,
                1,
            )],
        );
        push_cpu(&mut app, &[95.0, 95.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 2);
    }

    #[test]
    fn test_no_policies_is_a_noop() {
        let mut app = app(2, 1, 5, Vec::new());
        push_cpu(&mut app, &[95.0]);

        calibrate_desired(&mut app);
        assert_eq!(app.desired, 2);
    }
}
