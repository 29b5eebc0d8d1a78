//! ---
//! fl_section: "01-core-functionality"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fleet configuration and the chaos target registry."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_instance_count() -> u32 {
    1
}

fn default_health_endpoint() -> String {
    "/health".to_owned()
}

fn default_recovery_budget() -> Duration {
    Duration::from_secs(30)
}

fn default_max_active() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_violation_threshold() -> u32 {
    3
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_target_port() -> u16 {
    8000
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9898"
        .parse()
        .expect("valid default metrics address")
}

/// Primary configuration object for the Faultline runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FleetConfig {
    /// Chaos profile per service name. Loaded once, never mutated.
    #[serde(default)]
    pub targets: IndexMap<String, TargetProfile>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FleetConfig {
    pub const ENV_CONFIG_PATH: &str = "FAULTLINE_CONFIG";

    /// Load configuration from disk, respecting the `FAULTLINE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::from_path(candidate.as_ref().to_path_buf());
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading fleet configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<FleetConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a target profile by service name.
    pub fn target(&self, service: &str) -> Option<&TargetProfile> {
        self.targets.get(service)
    }

    /// Service names flagged as safety critical across the whole fleet.
    pub fn safety_critical_services(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|(_, profile)| profile.safety_critical)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(anyhow!("configuration must declare at least one target"));
        }
        for (service, profile) in &self.targets {
            profile.validate(service)?;
        }
        self.orchestrator.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for FleetConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: FleetConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Chaos profile for a single named service.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Informational replica count.
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
    /// Relative path polled for liveness.
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
    /// Seconds allowed for the target to become healthy again after injection stops.
    #[serde(default = "default_recovery_budget")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub recovery_time_budget: Duration,
    /// Failure kinds this target may receive.
    #[serde(default)]
    pub allowed_failures: Vec<FailureKind>,
    /// When true the injector re-confirms target health immediately before injecting.
    #[serde(default)]
    pub safety_critical: bool,
    /// Optional `host:port` override. Defaults to `{service}:{target_port}`.
    #[serde(default)]
    pub authority: Option<String>,
}

impl TargetProfile {
    pub fn validate(&self, service: &str) -> Result<()> {
        if self.instance_count == 0 {
            return Err(anyhow!(
                "target '{}' must declare at least one instance",
                service
            ));
        }
        if !self.health_endpoint.starts_with('/') {
            return Err(anyhow!(
                "target '{}' health endpoint '{}' must be an absolute path",
                service,
                self.health_endpoint
            ));
        }
        if self.recovery_time_budget.is_zero() {
            return Err(anyhow!(
                "target '{}' recovery budget must be greater than zero",
                service
            ));
        }
        Ok(())
    }

    /// Whether a failure kind is permitted against this target.
    pub fn allows(&self, kind: FailureKind) -> bool {
        self.allowed_failures.contains(&kind)
    }
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            instance_count: default_instance_count(),
            health_endpoint: default_health_endpoint(),
            recovery_time_budget: default_recovery_budget(),
            allowed_failures: Vec::new(),
            safety_critical: false,
            authority: None,
        }
    }
}

/// Closed set of disruption types. Each kind maps to exactly one injection procedure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkLatency,
    NetworkPartition,
    ServiceCrash,
    DatabaseFailure,
    MemoryPressure,
    CpuSpike,
    DiskFailure,
    ToxicContent,
    AiHallucination,
    SecurityBreach,
}

impl FailureKind {
    /// All known failure kinds, in declaration order.
    pub const ALL: [FailureKind; 10] = [
        FailureKind::NetworkLatency,
        FailureKind::NetworkPartition,
        FailureKind::ServiceCrash,
        FailureKind::DatabaseFailure,
        FailureKind::MemoryPressure,
        FailureKind::CpuSpike,
        FailureKind::DiskFailure,
        FailureKind::ToxicContent,
        FailureKind::AiHallucination,
        FailureKind::SecurityBreach,
    ];

    /// Static label used for metrics and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkLatency => "network_latency",
            FailureKind::NetworkPartition => "network_partition",
            FailureKind::ServiceCrash => "service_crash",
            FailureKind::DatabaseFailure => "database_failure",
            FailureKind::MemoryPressure => "memory_pressure",
            FailureKind::CpuSpike => "cpu_spike",
            FailureKind::DiskFailure => "disk_failure",
            FailureKind::ToxicContent => "toxic_content",
            FailureKind::AiHallucination => "ai_hallucination",
            FailureKind::SecurityBreach => "security_breach",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs for the experiment orchestrator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Preflight rejects a run when more experiments than this are already active.
    #[serde(default = "default_max_active")]
    pub max_active_experiments: usize,
    /// Cadence of the safety-monitor polling loop.
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub monitor_poll_interval: Duration,
    /// Observed predicate violations that trigger a self-protective abort.
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: u32,
    /// Per-call timeout applied to health and metrics requests.
    #[serde(default = "default_health_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub health_timeout: Duration,
    /// Port services listen on when no authority override is configured.
    #[serde(default = "default_target_port")]
    pub target_port: u16,
    /// Services polled by post-experiment verification, distinct from the
    /// experiment's own targets.
    #[serde(default)]
    pub safety_services: Vec<String>,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.violation_threshold == 0 {
            return Err(anyhow!("violation threshold must be greater than zero"));
        }
        if self.monitor_poll_interval.is_zero() {
            return Err(anyhow!("monitor poll interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_active_experiments: default_max_active(),
            monitor_poll_interval: default_poll_interval(),
            violation_threshold: default_violation_threshold(),
            health_timeout: default_health_timeout(),
            target_port: default_target_port(),
            safety_services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [targets.api-gateway]
        instance_count = 3
        health_endpoint = "/health"
        recovery_time_budget = 30
        allowed_failures = ["network_latency", "service_crash", "memory_pressure"]
        safety_critical = true

        [targets.model-backend]
        recovery_time_budget = 60
        allowed_failures = ["ai_hallucination", "toxic_content"]

        [orchestrator]
        max_active_experiments = 2
        safety_services = ["api-gateway"]
    "#;

    #[test]
    fn parses_sample_fleet() {
        let config: FleetConfig = SAMPLE.parse().unwrap();
        assert_eq!(config.targets.len(), 2);

        let gateway = config.target("api-gateway").unwrap();
        assert_eq!(gateway.instance_count, 3);
        assert!(gateway.safety_critical);
        assert!(gateway.allows(FailureKind::ServiceCrash));
        assert!(!gateway.allows(FailureKind::ToxicContent));

        let backend = config.target("model-backend").unwrap();
        assert_eq!(backend.recovery_time_budget, Duration::from_secs(60));
        assert_eq!(backend.instance_count, 1);
        assert_eq!(backend.health_endpoint, "/health");

        assert_eq!(config.orchestrator.max_active_experiments, 2);
        assert_eq!(
            config.orchestrator.monitor_poll_interval,
            Duration::from_secs(10)
        );
        assert_eq!(config.safety_critical_services(), vec!["api-gateway"]);
    }

    #[test]
    fn rejects_empty_fleet() {
        let err = "".parse::<FleetConfig>().unwrap_err();
        assert!(err.to_string().contains("at least one target"));
    }

    #[test]
    fn rejects_relative_health_endpoint() {
        let bad = r#"
            [targets.svc]
            health_endpoint = "health"
        "#;
        let err = bad.parse::<FleetConfig>().unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }

    #[test]
    fn rejects_zero_recovery_budget() {
        let bad = r#"
            [targets.svc]
            recovery_time_budget = 0
        "#;
        assert!(bad.parse::<FleetConfig>().is_err());
    }

    #[test]
    fn failure_kind_labels_round_trip() {
        for kind in FailureKind::ALL {
            let toml = format!("allowed_failures = [\"{}\"]", kind.as_str());
            #[derive(Deserialize)]
            struct Wrapper {
                allowed_failures: Vec<FailureKind>,
            }
            let parsed: Wrapper = toml::from_str(&toml).unwrap();
            assert_eq!(parsed.allowed_failures, vec![kind]);
        }
    }

    #[test]
    fn load_reads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let missing = dir.path().join("absent.toml");
        let config = FleetConfig::load(&[missing, path]).unwrap();
        assert!(config.target("model-backend").is_some());
    }
}
