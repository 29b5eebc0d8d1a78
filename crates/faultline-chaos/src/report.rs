//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Experiment reports and the fleet resilience score."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::experiment::ExperimentMetrics;

/// Overall judgement for a single experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No safety violations and a success rate strictly above 0.8.
    Pass,
    /// Anything less.
    Fail,
}

impl Verdict {
    /// PASS requires a spotless safety record and a success rate strictly
    /// above 0.8.
    pub fn from_metrics(metrics: &ExperimentMetrics) -> Self {
        if metrics.safety_violations == 0 && metrics.success_rate > 0.8 {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Per-experiment report derived from recorded metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Identifier the experiment was registered under.
    pub experiment_id: String,
    /// Terminal status as its wire label.
    pub status: String,
    /// End minus start, 0 while unfinished.
    pub duration_seconds: f64,
    /// Failures dispatched during injection.
    pub failures_injected: u64,
    /// Failures the fleet observably recovered from.
    pub failures_detected: u64,
    /// detected / injected, 0 when nothing was injected.
    pub success_rate: f64,
    /// Seconds until the last target passed recovery validation.
    pub recovery_time_seconds: f64,
    /// Safety violations recorded across monitoring and verification.
    pub safety_violations: u64,
    /// Overall pass/fail judgement.
    pub verdict: Verdict,
}

/// Look up an experiment in history by id. Unknown ids yield `None` rather
/// than an error.
pub fn experiment_report(history: &[ExperimentMetrics], experiment_id: &str) -> Option<ExperimentReport> {
    let metrics = history
        .iter()
        .find(|entry| entry.experiment_id == experiment_id)?;
    Some(ExperimentReport {
        experiment_id: metrics.experiment_id.clone(),
        status: metrics.status.as_str().to_owned(),
        duration_seconds: metrics.duration_seconds(),
        failures_injected: metrics.failures_injected,
        failures_detected: metrics.failures_detected,
        success_rate: metrics.success_rate,
        recovery_time_seconds: metrics.recovery_time_seconds,
        safety_violations: metrics.safety_violations,
        verdict: Verdict::from_metrics(metrics),
    })
}

/// Fleet-wide 0-100 resilience aggregate over experiment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceScore {
    /// Weighted score in [0, 100].
    pub resilience_score: f64,
    /// Letter grade with qualifier, e.g. `"B (Good)"`.
    pub grade: String,
    /// Experiments contributing to the aggregate.
    pub experiments_count: usize,
    /// Experiments whose verdict was PASS.
    pub successful_experiments: usize,
    /// Mean per-experiment success rate.
    pub avg_success_rate: f64,
    /// Mean measured recovery time in seconds.
    pub avg_recovery_seconds: f64,
    /// Violations summed across all experiments.
    pub total_safety_violations: u64,
}

/// Aggregate all historical experiments into a single heuristic score:
/// 40 points for the PASS ratio, 30 for average success rate, 20 for
/// recovery speed against a 60s budget, 10 for staying under 10 total
/// safety violations.
pub fn resilience_score(history: &[ExperimentMetrics]) -> ResilienceScore {
    if history.is_empty() {
        return ResilienceScore {
            resilience_score: 0.0,
            grade: grade_for(0.0).to_owned(),
            experiments_count: 0,
            successful_experiments: 0,
            avg_success_rate: 0.0,
            avg_recovery_seconds: 0.0,
            total_safety_violations: 0,
        };
    }

    let total = history.len();
    let successful = history
        .iter()
        .filter(|entry| Verdict::from_metrics(entry) == Verdict::Pass)
        .count();
    let avg_success_rate =
        history.iter().map(|entry| entry.success_rate).sum::<f64>() / total as f64;
    let avg_recovery_seconds = history
        .iter()
        .map(|entry| entry.recovery_time_seconds)
        .sum::<f64>()
        / total as f64;
    let total_safety_violations: u64 =
        history.iter().map(|entry| entry.safety_violations).sum();

    let score = (successful as f64 / total as f64) * 40.0
        + avg_success_rate.min(1.0) * 30.0
        + ((60.0 - avg_recovery_seconds) / 60.0).max(0.0) * 20.0
        + ((10.0 - total_safety_violations as f64) / 10.0).max(0.0) * 10.0;

    ResilienceScore {
        resilience_score: score,
        grade: grade_for(score).to_owned(),
        experiments_count: total,
        successful_experiments: successful,
        avg_success_rate,
        avg_recovery_seconds,
        total_safety_violations,
    }
}

fn grade_for(score: f64) -> &'static str {
    if score >= 90.0 {
        "A+ (Excellent)"
    } else if score >= 80.0 {
        "A (Very Good)"
    } else if score >= 70.0 {
        "B (Good)"
    } else if score >= 60.0 {
        "C (Fair)"
    } else if score >= 50.0 {
        "D (Poor)"
    } else {
        "F (Failing)"
    }
}
