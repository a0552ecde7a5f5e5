use k8s_openapi::{
    api::core::v1::{PersistentVolumeClaim, Pod, PodSpec},
    apimachinery::pkg::apis::meta::v1::Time,
};
use serde::Serialize;
use std::sync::Arc;
use volm_controller_core::{ClaimRecord, DateTime, Utc, WorkloadPhase, WorkloadRecord};

/// Converts a Kubernetes resource into the record cached for it.
pub trait IntoRecord {
    type Record;

    fn into_record(self) -> Self::Record;
}

impl IntoRecord for PersistentVolumeClaim {
    type Record = ClaimRecord;

    fn into_record(self) -> ClaimRecord {
        let PersistentVolumeClaim {
            metadata,
            spec,
            status,
        } = self;

        ClaimRecord {
            name: metadata.name.unwrap_or_default(),
            labels: metadata.labels.into(),
            annotations: Arc::new(metadata.annotations.unwrap_or_default()),
            status: json(&status.unwrap_or_default()),
            spec: json(&spec.unwrap_or_default()),
            deletion_timestamp: metadata.deletion_timestamp.as_ref().and_then(timestamp),
        }
    }
}

impl IntoRecord for Pod {
    type Record = WorkloadRecord;

    fn into_record(self) -> WorkloadRecord {
        let Pod {
            metadata,
            spec,
            status,
        } = self;
        let name = metadata.name.unwrap_or_default();
        let claims = spec
            .map(|spec| claim_names(&name, spec))
            .unwrap_or_default();
        let status = status.unwrap_or_default();

        WorkloadRecord {
            labels: metadata.labels.into(),
            annotations: Arc::new(metadata.annotations.unwrap_or_default()),
            phase: status
                .phase
                .as_deref()
                .map(WorkloadPhase::parse)
                .unwrap_or_default(),
            start_time: status.start_time.as_ref().and_then(timestamp),
            deletion_timestamp: metadata.deletion_timestamp.as_ref().and_then(timestamp),
            claims,
            name,
        }
    }
}

/// Lists the claims bound by a pod's volumes.
///
/// Generic ephemeral volumes are backed by a claim named `<pod>-<volume>`.
fn claim_names(pod: &str, spec: PodSpec) -> Vec<String> {
    spec.volumes
        .into_iter()
        .flatten()
        .filter_map(|volume| {
            if let Some(pvc) = volume.persistent_volume_claim {
                return Some(pvc.claim_name);
            }
            volume
                .ephemeral
                .map(|_| format!("{}-{}", pod, volume.name))
        })
        .collect()
}

fn json<T: Serialize>(t: &T) -> serde_json::Value {
    serde_json::to_value(t).unwrap_or_default()
}

/// Decodes a timestamp through its RFC 3339 wire form.
fn timestamp(time: &Time) -> Option<DateTime<Utc>> {
    match serde_json::to_value(time) {
        Ok(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}
