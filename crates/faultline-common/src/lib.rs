//! ---
//! fl_section: "01-core-functionality"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the Faultline workspace."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Core shared primitives for the Faultline chaos orchestration workspace.
//! This crate exposes fleet configuration loading, logging bootstrap, and
//! clock utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    FailureKind, FleetConfig, LoggingConfig, MetricsConfig, OrchestratorConfig, TargetProfile,
};
pub use logging::{init_tracing, LogFormat};
