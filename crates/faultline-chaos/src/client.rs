//! ---
//! fl_section: "02-chaos-orchestration"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "HTTP client for target health, metrics, and probe endpoints."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{Context, Result};
use faultline_common::TargetProfile;
use tracing::debug;

/// Thin HTTP client for the per-target health/metrics/probe surface.
///
/// Targets are addressed as `http://{service}:{port}` unless the profile
/// carries an explicit authority override. A 200 status is the only success
/// signal consulted; bodies are opaque except for the metrics snapshot.
#[derive(Debug, Clone)]
pub struct TargetClient {
    http: reqwest::Client,
    target_port: u16,
}

impl TargetClient {
    /// Build a client with the given per-call timeout and default port.
    pub fn new(timeout: Duration, target_port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build target http client")?;
        Ok(Self { http, target_port })
    }

    fn base_url(&self, service: &str, profile: &TargetProfile) -> String {
        match &profile.authority {
            Some(authority) => format!("http://{}", authority),
            None => format!("http://{}:{}", service, self.target_port),
        }
    }

    /// Poll the target's health endpoint once. Any transport error counts as
    /// unhealthy.
    pub async fn check_health(&self, service: &str, profile: &TargetProfile) -> bool {
        let url = format!(
            "{}{}",
            self.base_url(service, profile),
            profile.health_endpoint
        );
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(service, error = %err, "health check unreachable");
                false
            }
        }
    }

    /// Fetch the target's self-reported metrics endpoint. Unreachable targets
    /// yield `None`, never an error.
    pub async fn metrics_snapshot(
        &self,
        service: &str,
        profile: &TargetProfile,
    ) -> Option<serde_json::Value> {
        let url = format!("{}/metrics", self.base_url(service, profile));
        let response = match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(service, status = %response.status(), "metrics snapshot rejected");
                return None;
            }
            Err(err) => {
                debug!(service, error = %err, "metrics snapshot unreachable");
                return None;
            }
        };
        // Stored verbatim; non-JSON bodies are kept as a raw string.
        match response.text().await {
            Ok(body) => Some(
                serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)),
            ),
            Err(err) => {
                debug!(service, error = %err, "metrics snapshot body unreadable");
                None
            }
        }
    }

    /// POST an adversarial probe payload to the given endpoint and report
    /// whether the target answered with a success status.
    pub async fn post_probe(
        &self,
        service: &str,
        profile: &TargetProfile,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<bool> {
        let url = format!("{}{}", self.base_url(service, profile), endpoint);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("probe request to {} failed", url))?;
        Ok(response.status().is_success())
    }
}
