//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Prometheus instruments published by the chaos subsystem."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use anyhow::Result;
use faultline_metrics::SharedRegistry;
use prometheus::{self, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

use crate::experiment::ExperimentStatus;
use faultline_common::FailureKind;

/// Metrics published by the chaos orchestration subsystem.
#[derive(Clone)]
pub struct ChaosMetrics {
    registry: SharedRegistry,
    experiments_total: IntCounterVec,
    injections_total: IntCounterVec,
    safety_violations_total: IntCounter,
    recovery_seconds: Histogram,
}

impl ChaosMetrics {
    /// Register the chaos metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let experiments_total = IntCounterVec::new(
            Opts::new(
                "faultline_experiments_total",
                "Chaos experiments by terminal status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(experiments_total.clone()))?;

        let injections_total = IntCounterVec::new(
            Opts::new(
                "faultline_injections_total",
                "Failure injections dispatched, by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(injections_total.clone()))?;

        let safety_violations_total = IntCounter::with_opts(Opts::new(
            "faultline_safety_violations_total",
            "Safety-predicate violations and post-experiment collateral findings",
        ))?;
        registry.register(Box::new(safety_violations_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "faultline_recovery_seconds",
            "Wall-clock duration of recovery validation per experiment",
        )
        .buckets(prometheus::exponential_buckets(0.5, 2.0, 12)?);
        let recovery_seconds = Histogram::with_opts(histogram_opts)?;
        registry.register(Box::new(recovery_seconds.clone()))?;

        Ok(Self {
            registry,
            experiments_total,
            injections_total,
            safety_violations_total,
            recovery_seconds,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count an experiment reaching a terminal status.
    pub fn record_experiment(&self, status: ExperimentStatus) {
        self.experiments_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Count one dispatched injection of the given kind.
    pub fn record_injection(&self, kind: FailureKind) {
        self.injections_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Add observed safety violations.
    pub fn add_safety_violations(&self, count: u64) {
        self.safety_violations_total.inc_by(count);
    }

    /// Observe the duration of one recovery-validation pass.
    pub fn observe_recovery(&self, seconds: f64) {
        self.recovery_seconds.observe(seconds);
    }
}

impl std::fmt::Debug for ChaosMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_metrics::new_registry;

    #[test]
    fn instruments_register_and_count() {
        let registry = new_registry();
        let metrics = ChaosMetrics::new(registry.clone()).unwrap();
        metrics.record_experiment(ExperimentStatus::Completed);
        metrics.record_injection(FailureKind::NetworkLatency);
        metrics.add_safety_violations(2);
        metrics.observe_recovery(1.5);

        let families = registry.gather();
        let injected = families
            .iter()
            .find(|fam| fam.get_name() == "faultline_injections_total")
            .expect("injection counter registered");
        assert_eq!(injected.get_metric()[0].get_counter().get_value(), 1.0);
    }
}
