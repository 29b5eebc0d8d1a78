//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Experiment lifecycle states and run metrics."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use faultline_common::time::utc_now;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a chaos experiment.
///
/// `Pending → Running → {Completed, Failed, Aborted}`; `Running` may pass
/// through `Rollback` on its way to `Failed`. `Running` is the only
/// non-terminal, non-initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Accepted but not yet started.
    Pending,
    /// Injection or monitoring in progress.
    Running,
    /// Emergency rollback in progress after an error or abort.
    Rollback,
    /// Ran to completion, recovery validated.
    Completed,
    /// An internal error ended the run.
    Failed,
    /// Stopped early by the safety monitor.
    Aborted,
}

impl ExperimentStatus {
    /// Static label for metrics and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Rollback => "rollback",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Failed => "failed",
            ExperimentStatus::Aborted => "aborted",
        }
    }

    /// Whether the state absorbs: no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExperimentStatus::Completed | ExperimentStatus::Failed | ExperimentStatus::Aborted
        )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics accumulated over one experiment run.
///
/// Counters are a faithful log of what occurred and are never clamped;
/// `failures_detected <= failures_injected` is a desired outcome, not an
/// enforced constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    /// Identifier of the form `{name}_{unix_timestamp}`.
    pub experiment_id: String,
    /// Current lifecycle state.
    pub status: ExperimentStatus,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Set once the experiment reaches a terminal status.
    pub ended_at: Option<DateTime<Utc>>,
    /// One per dispatched (target, kind) injection.
    pub failures_injected: u64,
    /// Incremented when recovery validation confirms a target came back
    /// within budget. The name is inherited from the original telemetry
    /// schema: recovered implies the earlier failure was real and resolved.
    pub failures_detected: u64,
    /// Wall-clock duration of the whole recovery-validation step.
    pub recovery_time_seconds: f64,
    /// Safety-predicate violations plus post-experiment collateral findings.
    pub safety_violations: u64,
    /// `failures_detected / failures_injected` when any were injected, else 0.
    pub success_rate: f64,
    /// Reserved for future performance-degradation measurement.
    pub performance_impact: f64,
}

impl ExperimentMetrics {
    /// Fresh metrics for a run that has just been accepted.
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            status: ExperimentStatus::Pending,
            started_at: utc_now(),
            ended_at: None,
            failures_injected: 0,
            failures_detected: 0,
            recovery_time_seconds: 0.0,
            safety_violations: 0,
            success_rate: 0.0,
            performance_impact: 0.0,
        }
    }

    /// Recompute the derived success rate from the raw counters.
    pub fn recompute_success_rate(&mut self) {
        self.success_rate = if self.failures_injected > 0 {
            self.failures_detected as f64 / self.failures_injected as f64
        } else {
            0.0
        };
    }

    /// Duration in seconds, 0 while the experiment is unfinished.
    pub fn duration_seconds(&self) -> f64 {
        match self.ended_at {
            Some(ended) => (ended - self.started_at)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            None => 0.0,
        }
    }
}

/// Shared mutation handle for one experiment's metrics.
///
/// The injection fan-out and the monitor loop update counters concurrently;
/// this cell is the single lock they contend on. All other per-experiment
/// state is owned by the experiment's own task.
#[derive(Debug, Clone)]
pub struct ExperimentCell {
    inner: Arc<Mutex<ExperimentMetrics>>,
}

impl ExperimentCell {
    /// Wrap fresh metrics for the given experiment id.
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ExperimentMetrics::new(experiment_id))),
        }
    }

    /// Identifier of the underlying experiment.
    pub fn experiment_id(&self) -> String {
        self.inner.lock().experiment_id.clone()
    }

    /// Transition the lifecycle state.
    pub fn set_status(&self, status: ExperimentStatus) {
        self.inner.lock().status = status;
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ExperimentStatus {
        self.inner.lock().status
    }

    /// One dispatched injection.
    pub fn record_injection(&self) {
        self.inner.lock().failures_injected += 1;
    }

    /// One confirmed recovery during validation.
    pub fn record_detection(&self) {
        let mut metrics = self.inner.lock();
        metrics.failures_detected += 1;
        metrics.recompute_success_rate();
    }

    /// Add observed safety violations.
    pub fn add_violations(&self, count: u64) {
        self.inner.lock().safety_violations += count;
    }

    /// Record the wall-clock duration of recovery validation.
    pub fn set_recovery_seconds(&self, seconds: f64) {
        let mut metrics = self.inner.lock();
        metrics.recovery_time_seconds = seconds;
        metrics.recompute_success_rate();
    }

    /// Stamp the end of the run.
    pub fn finalize(&self, status: ExperimentStatus) {
        let mut metrics = self.inner.lock();
        metrics.status = status;
        metrics.ended_at = Some(utc_now());
    }

    /// Clone the current metrics.
    pub fn snapshot(&self) -> ExperimentMetrics {
        self.inner.lock().clone()
    }
}
