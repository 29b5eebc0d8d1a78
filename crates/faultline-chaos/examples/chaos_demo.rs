//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_subsection: "example"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Example driving a full chaos experiment against a local mock fleet."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use faultline_chaos::prelude::*;
use faultline_common::{init_tracing, FailureKind, FleetConfig, TargetProfile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Self-contained fleet: the demo only targets the mock service below.
    let mut fleet = FleetConfig::default();
    init_tracing("chaos-demo", &fleet.logging)?;

    // Stand in for a real service so the demo runs self-contained.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/metrics", get(|| async { r#"{"requests": 42}"# }));
        axum::serve(listener, router).await
    });
    fleet.targets.insert(
        "demo-svc".into(),
        TargetProfile {
            recovery_time_budget: Duration::from_secs(10),
            allowed_failures: vec![FailureKind::NetworkLatency, FailureKind::CpuSpike],
            authority: Some(addr.to_string()),
            ..TargetProfile::default()
        },
    );

    let registry = faultline_metrics::new_registry();
    let chaos_metrics = faultline_chaos::ChaosMetrics::new(registry.clone()).ok();
    let orchestrator = ChaosOrchestrator::new(fleet, Arc::new(LoggingExecutor), chaos_metrics)?;
    orchestrator.add_safety_monitor(Arc::new(|_ctx: &SafetyContext| true));

    let spec = ExperimentSpec::new(
        "demo",
        vec!["demo-svc".into()],
        vec![FailureKind::NetworkLatency, FailureKind::CpuSpike],
        0,
        0.4,
    );
    let metrics = orchestrator.run_experiment(spec).await?;
    println!(
        "Experiment {} finished with status {}",
        metrics.experiment_id, metrics.status
    );

    if let Some(report) = orchestrator.experiment_report(&metrics.experiment_id) {
        println!(
            "Verdict {:?}: injected={} detected={} recovery={:.1}s",
            report.verdict,
            report.failures_injected,
            report.failures_detected,
            report.recovery_time_seconds
        );
    }

    let score = orchestrator.resilience_score();
    println!(
        "Fleet resilience: {:.1}/100 ({}) over {} experiments",
        score.resilience_score, score.grade, score.experiments_count
    );
    Ok(())
}
