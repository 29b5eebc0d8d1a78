//! ---
//! fl_section: "09-testing-qa"
//! fl_subsection: "integration-tests"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "End-to-end chaos experiment scenarios against mock targets."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use faultline_chaos::prelude::*;
use faultline_common::{FailureKind, FleetConfig, TargetProfile};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct RecordingExecutor {
    commands: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl DisruptionExecutor for RecordingExecutor {
    async fn execute(&self, command: &str, service: &str, _duration: Option<Duration>) -> Result<()> {
        self.commands
            .lock()
            .push((command.to_owned(), service.to_owned()));
        Ok(())
    }
}

async fn serve_target(status: StatusCode) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let router = Router::new()
            .route("/health", get(move || async move { status }))
            .route("/metrics", get(|| async { r#"{"requests": 42}"# }));
        axum::serve(listener, router).await.unwrap();
    });
    (addr, task)
}

fn fleet_for(addr: SocketAddr) -> FleetConfig {
    let mut fleet = FleetConfig::default();
    fleet.targets.insert(
        "svc-a".to_owned(),
        TargetProfile {
            recovery_time_budget: Duration::from_secs(5),
            allowed_failures: vec![FailureKind::NetworkLatency, FailureKind::CpuSpike],
            authority: Some(addr.to_string()),
            ..TargetProfile::default()
        },
    );
    fleet
}

#[tokio::test]
async fn latency_experiment_runs_to_completion_and_passes() {
    let (addr, server) = serve_target(StatusCode::OK).await;
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator =
        ChaosOrchestrator::new(fleet_for(addr), executor.clone(), None).unwrap();

    let spec = ExperimentSpec::new(
        "latency_smoke",
        vec!["svc-a".into()],
        vec![FailureKind::NetworkLatency],
        0,
        0.5,
    );
    let metrics = orchestrator.run_experiment(spec).await.unwrap();

    assert_eq!(metrics.status, ExperimentStatus::Completed);
    assert!(metrics.status.is_terminal());
    assert_eq!(metrics.failures_injected, 1);
    assert_eq!(metrics.failures_detected, 1);
    assert_eq!(metrics.safety_violations, 0);
    assert!(metrics.ended_at.is_some());
    assert!(metrics.experiment_id.starts_with("latency_smoke_"));
    assert_eq!(
        executor.commands.lock().as_slice(),
        &[("traffic-shape --delay-ms 500".to_owned(), "svc-a".to_owned())]
    );

    let report = orchestrator
        .experiment_report(&metrics.experiment_id)
        .unwrap();
    assert_eq!(report.verdict, Verdict::Pass);
    assert!(report.success_rate > 0.8);

    let score = orchestrator.resilience_score();
    assert_eq!(score.experiments_count, 1);
    assert_eq!(score.successful_experiments, 1);
    assert!(score.resilience_score > 60.0);
    server.abort();
}

#[tokio::test]
async fn failing_safety_predicates_abort_and_roll_back() {
    let (addr, server) = serve_target(StatusCode::OK).await;
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator =
        ChaosOrchestrator::new(fleet_for(addr), executor.clone(), None).unwrap();
    // Three failing predicates hit the violation threshold on the first
    // monitor tick, so the run aborts without waiting out the window.
    for _ in 0..3 {
        orchestrator
            .add_safety_monitor(Arc::new(|_ctx: &SafetyContext| false));
    }

    let spec = ExperimentSpec::new(
        "guarded",
        vec!["svc-a".into()],
        vec![FailureKind::CpuSpike],
        30,
        0.5,
    );
    let metrics = orchestrator.run_experiment(spec).await.unwrap();

    assert_eq!(metrics.status, ExperimentStatus::Aborted);
    assert_eq!(metrics.safety_violations, 3);
    // Recovery validation is skipped after an abort.
    assert_eq!(metrics.failures_detected, 0);
    assert_eq!(metrics.recovery_time_seconds, 0.0);

    let commands = executor.commands.lock();
    assert!(commands
        .iter()
        .any(|(command, _)| command == "clear-disruptions"));

    let report = orchestrator
        .experiment_report(&metrics.experiment_id)
        .unwrap();
    assert_eq!(report.verdict, Verdict::Fail);
    server.abort();
}

#[tokio::test]
async fn rejected_experiments_never_enter_history() {
    let (addr, server) = serve_target(StatusCode::OK).await;
    let orchestrator = ChaosOrchestrator::new(
        fleet_for(addr),
        Arc::new(RecordingExecutor::default()),
        None,
    )
    .unwrap();

    let spec = ExperimentSpec::new(
        "ghost_run",
        vec!["svc-missing".into()],
        vec![FailureKind::NetworkLatency],
        0,
        0.5,
    );
    let err = orchestrator.run_experiment(spec).await.unwrap_err();
    assert!(matches!(err, ExperimentError::UnknownTarget(_)));
    assert!(orchestrator.history().is_empty());
    assert_eq!(orchestrator.active_count(), 0);
    assert!(orchestrator.experiment_report("ghost_run_0").is_none());
    server.abort();
}

#[tokio::test]
async fn prometheus_endpoint_reflects_experiment_counters() {
    let (addr, server) = serve_target(StatusCode::OK).await;
    let registry = faultline_metrics::new_registry();
    let chaos_metrics = faultline_chaos::ChaosMetrics::new(registry.clone()).unwrap();
    let orchestrator = ChaosOrchestrator::new(
        fleet_for(addr),
        Arc::new(RecordingExecutor::default()),
        Some(chaos_metrics),
    )
    .unwrap();

    let spec = ExperimentSpec::new(
        "scraped",
        vec!["svc-a".into()],
        vec![FailureKind::NetworkLatency],
        0,
        0.5,
    );
    orchestrator.run_experiment(spec).await.unwrap();

    let exporter =
        faultline_metrics::spawn_http_server(registry, "127.0.0.1:0".parse().unwrap()).unwrap();
    let body = reqwest::get(format!("http://{}/metrics", exporter.addr()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(r#"faultline_experiments_total{status="completed"} 1"#));
    assert!(body.contains(r#"faultline_injections_total{kind="network_latency"} 1"#));

    exporter.shutdown().await.unwrap();
    server.abort();
}

#[test]
fn dev_fleet_config_parses_and_validates() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/fleet.dev.toml");
    let raw = std::fs::read_to_string(&path).unwrap();
    let fleet: FleetConfig = raw.parse().unwrap();
    assert!(fleet.target("api-gateway").unwrap().safety_critical);
    assert_eq!(
        fleet.orchestrator.safety_services,
        vec!["api-gateway".to_owned()]
    );
    assert!(fleet
        .target("model-server")
        .unwrap()
        .allows(FailureKind::AiHallucination));
}

#[tokio::test]
async fn resilience_score_accumulates_across_experiments() {
    let (addr, server) = serve_target(StatusCode::OK).await;
    let orchestrator = ChaosOrchestrator::new(
        fleet_for(addr),
        Arc::new(RecordingExecutor::default()),
        None,
    )
    .unwrap();

    let empty = orchestrator.resilience_score();
    assert_eq!(empty.experiments_count, 0);
    assert_eq!(empty.resilience_score, 0.0);
    assert_eq!(empty.grade, "F (Failing)");

    for name in ["first", "second"] {
        let spec = ExperimentSpec::new(
            name,
            vec!["svc-a".into()],
            vec![FailureKind::NetworkLatency],
            0,
            0.3,
        );
        orchestrator.run_experiment(spec).await.unwrap();
    }

    let score = orchestrator.resilience_score();
    assert_eq!(score.experiments_count, 2);
    assert_eq!(score.successful_experiments, 2);
    assert_eq!(score.total_safety_violations, 0);
    assert!(score.resilience_score > empty.resilience_score);
    assert_eq!(orchestrator.history().len(), 2);
    server.abort();
}
