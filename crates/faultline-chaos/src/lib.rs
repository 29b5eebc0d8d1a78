//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Chaos experiment orchestration, injection, and reporting."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod client;
pub mod experiment;
pub mod inject;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod report;

pub use client::TargetClient;
pub use experiment::{ExperimentCell, ExperimentMetrics, ExperimentStatus};
pub use inject::{DisruptionExecutor, FailureInjector, LoggingExecutor};
pub use metrics::ChaosMetrics;
pub use monitor::{ExperimentMonitor, MonitorOutcome, SafetyContext, SafetyPredicate};
pub use orchestrator::{ChaosOrchestrator, ExperimentError, ExperimentSpec};
pub use report::{ExperimentReport, ResilienceScore, Verdict};

/// Crate prelude collecting the most commonly used entry points.
pub mod prelude {
    pub use super::experiment::{ExperimentMetrics, ExperimentStatus};
    pub use super::inject::{DisruptionExecutor, LoggingExecutor};
    pub use super::monitor::{SafetyContext, SafetyPredicate};
    pub use super::orchestrator::{ChaosOrchestrator, ExperimentError, ExperimentSpec};
    pub use super::report::{ExperimentReport, ResilienceScore, Verdict};
}
