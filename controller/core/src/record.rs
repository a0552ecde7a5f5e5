use crate::labels::{Labels, Map};
use chrono::{offset::Utc, DateTime};
use serde::Serialize;
use std::sync::Arc;

/// A resource that is uniquely identified by its name within a collection.
pub trait Named {
    fn name(&self) -> &str;
}

/// The last-known state of a storage claim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimRecord {
    pub name: String,
    pub labels: Labels,
    pub annotations: Arc<Map>,
    pub status: serde_json::Value,
    pub spec: serde_json::Value,

    /// Set when the claim is being torn down upstream.
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

/// The last-known state of a workload that may bind storage claims.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkloadRecord {
    pub name: String,
    pub labels: Labels,
    pub annotations: Arc<Map>,
    pub phase: WorkloadPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Names of the claims bound by the workload's volumes, in declaration order.
    pub claims: Vec<String>,
}

/// A pod's lifecycle phase. Pods that have not reported a phase, or report one outside this set,
/// are `Unknown` and serialize as `"Unknown"` rather than an empty string.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

// === impl ClaimRecord ===

impl Named for ClaimRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ClaimRecord {
    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

// === impl WorkloadRecord ===

impl Named for WorkloadRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

impl WorkloadRecord {
    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn references(&self, claim: &str) -> bool {
        self.claims.iter().any(|c| c == claim)
    }
}

// === impl WorkloadPhase ===

impl WorkloadPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}
