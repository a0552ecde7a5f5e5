use crate::{
    labels::{Labels, Map},
    record::{ClaimRecord, WorkloadPhase, WorkloadRecord},
};
use chrono::{offset::Utc, DateTime};
use serde::Serialize;
use std::sync::Arc;

/// A claim joined with the workloads that currently bind it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeView {
    pub name: String,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(skip_serializing_if = "is_empty")]
    pub annotations: Arc<Map>,
    pub status: serde_json::Value,
    pub spec: serde_json::Value,
    pub terminating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminating_since: Option<DateTime<Utc>>,
    pub used_by: Vec<WorkloadSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(skip_serializing_if = "is_empty")]
    pub annotations: Arc<Map>,
    pub phase: WorkloadPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub terminating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminating_since: Option<DateTime<Utc>>,
}

fn is_empty(map: &Arc<Map>) -> bool {
    map.is_empty()
}

// === impl VolumeView ===

impl VolumeView {
    pub fn new(claim: &ClaimRecord, used_by: Vec<WorkloadSummary>) -> Self {
        Self {
            name: claim.name.clone(),
            labels: claim.labels.clone(),
            annotations: claim.annotations.clone(),
            status: claim.status.clone(),
            spec: claim.spec.clone(),
            terminating: claim.is_terminating(),
            terminating_since: claim.deletion_timestamp,
            used_by,
        }
    }
}

// === impl WorkloadSummary ===

impl From<&WorkloadRecord> for WorkloadSummary {
    fn from(workload: &WorkloadRecord) -> Self {
        Self {
            name: workload.name.clone(),
            labels: workload.labels.clone(),
            annotations: workload.annotations.clone(),
            phase: workload.phase,
            start_time: workload.start_time,
            terminating: workload.is_terminating(),
            terminating_since: workload.deletion_timestamp,
        }
    }
}
