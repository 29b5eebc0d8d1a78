//! ---
//! fl_section: "01-core-functionality"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Clock helpers shared across the workspace."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};

/// Current wall-clock time.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Seconds since the unix epoch.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Build an experiment identifier from its name and start time.
///
/// Collisions are possible when two experiments with the same name start in
/// the same second; ids exist for observability, not identity.
pub fn experiment_id(name: &str) -> String {
    format!("{}_{}", name, unix_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_embeds_name_and_timestamp() {
        let id = experiment_id("latency-soak");
        let (name, ts) = id.rsplit_once('_').unwrap();
        assert_eq!(name, "latency-soak");
        assert!(ts.parse::<i64>().unwrap() > 0);
    }
}
