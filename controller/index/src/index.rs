use crate::store::SharedStore;
use std::{collections::HashMap, sync::Arc};
use volm_controller_core::{
    ClaimRecord, Error, Result, Selector, VolumeView, WorkloadRecord, WorkloadSummary,
};

/// Joins the claim and workload stores to answer volume queries.
///
/// Queries only read store snapshots and never contact the authority. The two stores are read
/// independently, so a result may combine claims and workloads observed at slightly different
/// moments.
#[derive(Clone, Debug)]
pub struct Index {
    claims: SharedStore<ClaimRecord>,
    workloads: SharedStore<WorkloadRecord>,
}

// === impl Index ===

impl Index {
    pub fn new(claims: SharedStore<ClaimRecord>, workloads: SharedStore<WorkloadRecord>) -> Self {
        Self { claims, workloads }
    }

    pub fn claims(&self) -> &SharedStore<ClaimRecord> {
        &self.claims
    }

    pub fn workloads(&self) -> &SharedStore<WorkloadRecord> {
        &self.workloads
    }

    /// Returns a view of every claim selected by `selector`, in no particular order.
    pub fn list_volumes(&self, selector: &Selector) -> Vec<VolumeView> {
        let claims = self.claims.list();
        let workloads = self.workloads.list();

        let mut by_claim = HashMap::<&str, Vec<WorkloadSummary>>::new();
        for workload in &workloads {
            let mut seen = Vec::with_capacity(workload.claims.len());
            for claim in &workload.claims {
                // A workload may bind the same claim through several volumes.
                if seen.contains(&claim) {
                    continue;
                }
                seen.push(claim);
                by_claim
                    .entry(claim.as_str())
                    .or_default()
                    .push(WorkloadSummary::from(&**workload));
            }
        }

        claims
            .iter()
            .filter(|claim| selector.matches(&claim.labels))
            .map(|claim| {
                let used_by = by_claim.remove(claim.name.as_str()).unwrap_or_default();
                VolumeView::new(claim, used_by)
            })
            .collect()
    }

    /// Returns a view of the named claim.
    ///
    /// Fails with [`Error::NotFound`] if the claim is not cached and with
    /// [`Error::SelectorMismatch`] if it is cached but not selected.
    pub fn get_volume(&self, name: &str, selector: &Selector) -> Result<VolumeView> {
        let claim = self.claims.get(name).ok_or_else(|| Error::not_found(name))?;
        selector
            .check(&claim.labels)
            .map_err(|mismatch| Error::SelectorMismatch {
                name: name.to_string(),
                mismatch,
            })?;

        let used_by = used_by(&self.workloads.list(), name);
        Ok(VolumeView::new(&claim, used_by))
    }
}

fn used_by(workloads: &[Arc<WorkloadRecord>], claim: &str) -> Vec<WorkloadSummary> {
    workloads
        .iter()
        .filter(|w| w.references(claim))
        .map(|w| WorkloadSummary::from(&**w))
        .collect()
}
