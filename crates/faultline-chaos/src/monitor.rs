//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Safety monitoring, baseline capture, and recovery validation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use faultline_common::FleetConfig;
use indexmap::IndexMap;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::TargetClient;
use crate::experiment::ExperimentCell;

/// Context handed to every safety predicate on each polling tick.
#[derive(Debug, Clone)]
pub struct SafetyContext {
    /// Identifier of the experiment under observation.
    pub experiment_id: String,
}

/// Externally supplied check polled during an experiment to detect
/// unacceptable collateral harm. Returning `false` records a violation.
pub type SafetyPredicate = Arc<dyn Fn(&SafetyContext) -> bool + Send + Sync>;

/// Result of one monitoring pass.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOutcome {
    /// Violations observed over the loop's lifetime.
    pub violations: u32,
    /// True when the loop hit the violation threshold and stopped early.
    pub aborted: bool,
}

/// Polls safety predicates and target health during and after an experiment.
#[derive(Debug, Clone)]
pub struct ExperimentMonitor {
    fleet: Arc<FleetConfig>,
    client: TargetClient,
    poll_interval: Duration,
    violation_threshold: u32,
}

impl ExperimentMonitor {
    /// Build a monitor over the given fleet, using the orchestrator-configured
    /// cadence and abort threshold.
    pub fn new(fleet: Arc<FleetConfig>, client: TargetClient) -> Self {
        let poll_interval = fleet.orchestrator.monitor_poll_interval;
        let violation_threshold = fleet.orchestrator.violation_threshold;
        Self {
            fleet,
            client,
            poll_interval,
            violation_threshold,
        }
    }

    /// Best-effort snapshot of each target's self-reported metrics before
    /// injection. Unreachable targets yield an empty record, never an error.
    pub async fn collect_baseline(
        &self,
        targets: &[String],
    ) -> IndexMap<String, serde_json::Value> {
        let mut baseline = IndexMap::with_capacity(targets.len());
        for service in targets {
            let Some(profile) = self.fleet.target(service) else {
                continue;
            };
            let snapshot = self
                .client
                .metrics_snapshot(service, profile)
                .await
                .unwrap_or_else(|| serde_json::json!({}));
            baseline.insert(service.clone(), snapshot);
        }
        debug!(targets = baseline.len(), "baseline metrics collected");
        baseline
    }

    /// Run the safety polling loop for `duration`.
    ///
    /// Every tick evaluates each registered predicate; a predicate returning
    /// false bumps the violation counter. Reaching the threshold invokes
    /// `on_abort` (the orchestrator's emergency-rollback path) and stops
    /// polling immediately. This is the primary self-protection mechanism:
    /// no experiment runs unattended past the configured violation count.
    pub async fn run<F, Fut>(
        &self,
        experiment_id: &str,
        duration: Duration,
        predicates: &[SafetyPredicate],
        cell: &ExperimentCell,
        on_abort: F,
    ) -> MonitorOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let context = SafetyContext {
            experiment_id: experiment_id.to_owned(),
        };
        let deadline = Instant::now() + duration;
        let mut ticker = interval(self.poll_interval);
        let mut violations = 0u32;
        let mut ticks = 0u64;

        loop {
            let now = ticker.tick().await;
            if now >= deadline {
                break;
            }
            ticks += 1;

            for predicate in predicates {
                if !predicate(&context) {
                    violations += 1;
                    warn!(
                        experiment_id,
                        violations,
                        threshold = self.violation_threshold,
                        "safety predicate violation",
                    );
                }
            }

            if violations >= self.violation_threshold {
                warn!(
                    experiment_id,
                    violations, "violation threshold reached; aborting experiment",
                );
                cell.add_violations(u64::from(violations));
                on_abort().await;
                return MonitorOutcome {
                    violations,
                    aborted: true,
                };
            }

            self.collect_performance(experiment_id, ticks).await;
        }

        cell.add_violations(u64::from(violations));
        debug!(experiment_id, ticks, violations, "monitoring window closed");
        MonitorOutcome {
            violations,
            aborted: false,
        }
    }

    /// Per-tick performance hook. Informational for now; kept as a seam for
    /// richer degradation measurement feeding `performance_impact`.
    async fn collect_performance(&self, experiment_id: &str, tick: u64) {
        debug!(experiment_id, tick, "performance collection tick");
    }

    /// Poll each target's health endpoint once per second, up to its
    /// configured recovery budget, stopping early on the first healthy
    /// response. A recovery within budget confirms the earlier failure was
    /// real and now resolved, and bumps the detected counter; a timeout is
    /// logged but never raised.
    pub async fn validate_recovery(&self, targets: &[String], cell: &ExperimentCell) {
        let started = Instant::now();
        for service in targets {
            let Some(profile) = self.fleet.target(service) else {
                warn!(service, "recovery validation skipped: unknown target");
                continue;
            };
            let attempts = profile.recovery_time_budget.as_secs().max(1);
            let mut recovered = false;
            for attempt in 1..=attempts {
                if self.client.check_health(service, profile).await {
                    recovered = true;
                    info!(service, attempt, "target recovered within budget");
                    break;
                }
                if attempt < attempts {
                    sleep(Duration::from_secs(1)).await;
                }
            }
            if recovered {
                cell.record_detection();
            } else {
                warn!(
                    service,
                    budget_s = attempts,
                    "target failed to recover within budget",
                );
            }
        }
        cell.set_recovery_seconds(started.elapsed().as_secs_f64());
    }
}
