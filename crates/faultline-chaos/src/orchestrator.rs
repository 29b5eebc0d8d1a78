//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Experiment lifecycle orchestration over injector and monitor."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use faultline_common::{FailureKind, FleetConfig};
use futures::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::TargetClient;
use crate::experiment::{ExperimentCell, ExperimentMetrics, ExperimentStatus};
use crate::inject::{DisruptionExecutor, FailureInjector};
use crate::metrics::ChaosMetrics;
use crate::monitor::{ExperimentMonitor, SafetyPredicate};
use crate::report::{self, ExperimentReport, ResilienceScore};

/// Request to run one chaos experiment.
#[derive(Debug, Clone)]
pub struct ExperimentSpec {
    /// Human-readable experiment name, embedded in the generated id.
    pub name: String,
    /// Service names drawn from the target registry.
    pub targets: Vec<String>,
    /// Failure kinds to fan out across the targets.
    pub failure_kinds: Vec<FailureKind>,
    /// Length of the monitored window.
    pub duration: Duration,
    /// Failure intensity in [0, 1]. Out-of-range values are clamped.
    pub intensity: f64,
}

impl ExperimentSpec {
    /// Construct a spec with the duration given in minutes.
    pub fn new(
        name: impl Into<String>,
        targets: Vec<String>,
        failure_kinds: Vec<FailureKind>,
        duration_minutes: u64,
        intensity: f64,
    ) -> Self {
        Self {
            name: name.into(),
            targets,
            failure_kinds,
            duration: Duration::from_secs(duration_minutes * 60),
            intensity,
        }
    }
}

/// Rejections and failures surfaced by [`ChaosOrchestrator::run_experiment`].
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// The request named no targets.
    #[error("experiment requested no targets")]
    NoTargets,
    /// A requested target is absent from the registry.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    /// Preflight found too many experiments already running.
    #[error("{active} experiments already active (limit {limit})")]
    TooManyActive {
        /// Experiments in flight when the run was requested.
        active: usize,
        /// Configured `max_active_experiments`.
        limit: usize,
    },
    /// A safety-critical service failed its preflight health check.
    #[error("safety-critical service '{0}' failed preflight health check")]
    PreflightUnhealthy(String),
    /// Internal plumbing failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

enum PhaseOutcome {
    Completed,
    Aborted,
}

/// Owns the experiment lifecycle, the target registry, and the active and
/// historical experiment collections.
///
/// Constructed explicitly with its collaborators; there is no process-wide
/// default instance.
pub struct ChaosOrchestrator {
    fleet: Arc<FleetConfig>,
    client: TargetClient,
    injector: Arc<FailureInjector>,
    monitor: ExperimentMonitor,
    executor: Arc<dyn DisruptionExecutor>,
    predicates: Mutex<Vec<SafetyPredicate>>,
    active: Mutex<HashMap<String, ExperimentCell>>,
    history: Mutex<Vec<ExperimentMetrics>>,
    metrics: Option<ChaosMetrics>,
}

impl ChaosOrchestrator {
    /// Build an orchestrator over a validated fleet configuration and a
    /// disruption executor.
    pub fn new(
        fleet: FleetConfig,
        executor: Arc<dyn DisruptionExecutor>,
        metrics: Option<ChaosMetrics>,
    ) -> Result<Self> {
        let fleet = Arc::new(fleet);
        let client = TargetClient::new(
            fleet.orchestrator.health_timeout,
            fleet.orchestrator.target_port,
        )?;
        let injector = Arc::new(FailureInjector::new(
            fleet.clone(),
            client.clone(),
            executor.clone(),
            metrics.clone(),
        ));
        let monitor = ExperimentMonitor::new(fleet.clone(), client.clone());
        Ok(Self {
            fleet,
            client,
            injector,
            monitor,
            executor,
            predicates: Mutex::new(Vec::new()),
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            metrics,
        })
    }

    /// Register a safety predicate evaluated on every monitor tick.
    pub fn add_safety_monitor(&self, predicate: SafetyPredicate) {
        self.predicates.lock().push(predicate);
    }

    /// Number of currently running experiments.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Snapshots of the experiments currently in flight.
    pub fn active_experiments(&self) -> Vec<ExperimentMetrics> {
        self.active.lock().values().map(ExperimentCell::snapshot).collect()
    }

    /// Snapshot of all finished experiments, oldest first.
    pub fn history(&self) -> Vec<ExperimentMetrics> {
        self.history.lock().clone()
    }

    /// Run a chaos experiment through its full lifecycle: preflight,
    /// baseline, concurrent injection, timed monitoring, recovery
    /// validation, and post-experiment verification.
    ///
    /// Every accepted experiment lands in history exactly once and is
    /// removed from the active set, whatever the outcome; the finalized
    /// metrics are returned even for failed or aborted runs.
    pub async fn run_experiment(
        &self,
        spec: ExperimentSpec,
    ) -> Result<ExperimentMetrics, ExperimentError> {
        if spec.targets.is_empty() {
            return Err(ExperimentError::NoTargets);
        }
        for service in &spec.targets {
            if self.fleet.target(service).is_none() {
                return Err(ExperimentError::UnknownTarget(service.clone()));
            }
        }

        let intensity = if (0.0..=1.0).contains(&spec.intensity) {
            spec.intensity
        } else {
            let clamped = spec.intensity.clamp(0.0, 1.0);
            warn!(
                requested = spec.intensity,
                clamped, "intensity outside [0, 1]; clamping",
            );
            clamped
        };

        self.preflight().await?;

        let experiment_id = faultline_common::time::experiment_id(&spec.name);
        let cell = ExperimentCell::new(&experiment_id);
        cell.set_status(ExperimentStatus::Running);
        self.active.lock().insert(experiment_id.clone(), cell.clone());
        info!(
            %experiment_id,
            targets = ?spec.targets,
            kinds = ?spec.failure_kinds,
            duration_s = spec.duration.as_secs(),
            intensity,
            "experiment started",
        );

        let outcome = self
            .run_phases(&experiment_id, &spec, intensity, &cell)
            .await;

        let status = match outcome {
            Ok(PhaseOutcome::Completed) => ExperimentStatus::Completed,
            Ok(PhaseOutcome::Aborted) => ExperimentStatus::Aborted,
            Err(err) => {
                error!(%experiment_id, error = %err, "experiment phase failed");
                cell.set_status(ExperimentStatus::Rollback);
                self.emergency_rollback(&experiment_id, &spec.targets).await;
                ExperimentStatus::Failed
            }
        };

        // Finally-semantics: history must never lose a started experiment.
        cell.finalize(status);
        let snapshot = cell.snapshot();
        if let Some(metrics) = &self.metrics {
            metrics.record_experiment(status);
            metrics.add_safety_violations(snapshot.safety_violations);
        }
        self.history.lock().push(snapshot.clone());
        self.active.lock().remove(&experiment_id);
        info!(
            %experiment_id,
            status = %status,
            injected = snapshot.failures_injected,
            detected = snapshot.failures_detected,
            violations = snapshot.safety_violations,
            "experiment finished",
        );
        Ok(snapshot)
    }

    /// Fleet-wide safety gate evaluated before any side effect: bounded
    /// concurrency, and every safety-critical service in the registry must
    /// answer its health endpoint, whether or not it is an experiment target.
    async fn preflight(&self) -> Result<(), ExperimentError> {
        let active = self.active.lock().len();
        let limit = self.fleet.orchestrator.max_active_experiments;
        if active > limit {
            return Err(ExperimentError::TooManyActive { active, limit });
        }
        for (service, profile) in &self.fleet.targets {
            if !profile.safety_critical {
                continue;
            }
            if !self.client.check_health(service, profile).await {
                return Err(ExperimentError::PreflightUnhealthy(service.clone()));
            }
        }
        Ok(())
    }

    async fn run_phases(
        &self,
        experiment_id: &str,
        spec: &ExperimentSpec,
        intensity: f64,
        cell: &ExperimentCell,
    ) -> Result<PhaseOutcome> {
        // Phase 1: baseline measurement, best effort.
        let baseline = self.monitor.collect_baseline(&spec.targets).await;
        debug!(experiment_id, targets = baseline.len(), "baseline captured");

        // Phase 2: concurrent injection fan-out, one task per allowed
        // (target, kind) pair. Individual failures are logged and swallowed;
        // the join is a barrier, not a race.
        let mut tasks = Vec::new();
        for service in &spec.targets {
            let Some(profile) = self.fleet.target(service) else {
                continue;
            };
            for kind in &spec.failure_kinds {
                if !profile.allows(*kind) {
                    debug!(
                        experiment_id,
                        service,
                        kind = %kind,
                        "kind not allowed for target; skipping pair",
                    );
                    continue;
                }
                let injector = self.injector.clone();
                let service = service.clone();
                let kind = *kind;
                let cell = cell.clone();
                tasks.push(tokio::spawn(async move {
                    if let Err(err) = injector
                        .inject_failure(&service, kind, intensity, &cell)
                        .await
                    {
                        warn!(service = %service, kind = %kind, error = %err, "injection failed");
                    }
                }));
            }
        }
        for joined in join_all(tasks).await {
            if let Err(err) = joined {
                warn!(experiment_id, error = %err, "injection task panicked");
            }
        }

        // Phase 3: timed safety monitoring with the rollback path wired in.
        let predicates = self.predicates.lock().clone();
        let outcome = self
            .monitor
            .run(
                experiment_id,
                spec.duration,
                &predicates,
                cell,
                move || async move {
                    cell.set_status(ExperimentStatus::Rollback);
                    self.emergency_rollback(experiment_id, &spec.targets).await;
                },
            )
            .await;
        if outcome.aborted {
            return Ok(PhaseOutcome::Aborted);
        }

        // Phase 4: recovery validation.
        self.monitor.validate_recovery(&spec.targets, cell).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_recovery(cell.snapshot().recovery_time_seconds);
        }

        self.verify_collateral(experiment_id, cell).await;
        Ok(PhaseOutcome::Completed)
    }

    /// Post-experiment verification: poll the configured safety services
    /// (distinct from the experiment's own targets) and record a violation
    /// for each one that fails to answer. Catches collateral damage the
    /// experiment's own monitor did not observe.
    async fn verify_collateral(&self, experiment_id: &str, cell: &ExperimentCell) {
        for service in &self.fleet.orchestrator.safety_services {
            let Some(profile) = self.fleet.target(service) else {
                warn!(service, "safety service missing from registry");
                continue;
            };
            if !self.client.check_health(service, profile).await {
                warn!(
                    experiment_id,
                    service, "post-experiment verification found collateral damage",
                );
                cell.add_violations(1);
            }
        }
    }

    /// Best-effort rollback: issue a clear-disruptions command per target.
    /// Failures are logged at error severity and never re-raised.
    pub async fn emergency_rollback(&self, experiment_id: &str, targets: &[String]) {
        warn!(experiment_id, "emergency rollback initiated");
        for service in targets {
            if let Err(err) = self
                .executor
                .execute("clear-disruptions", service, None)
                .await
            {
                error!(
                    experiment_id,
                    service,
                    error = %err,
                    "rollback command failed",
                );
            }
        }
    }

    /// Report for one finished experiment; `None` for unknown ids.
    pub fn experiment_report(&self, experiment_id: &str) -> Option<ExperimentReport> {
        report::experiment_report(&self.history.lock(), experiment_id)
    }

    /// Fleet-wide resilience aggregate over all finished experiments.
    pub fn resilience_score(&self) -> ResilienceScore {
        report::resilience_score(&self.history.lock())
    }
}

impl std::fmt::Debug for ChaosOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosOrchestrator")
            .field("targets", &self.fleet.targets.len())
            .field("active", &self.active.lock().len())
            .finish_non_exhaustive()
    }
}
