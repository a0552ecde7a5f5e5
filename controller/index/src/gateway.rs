use crate::metrics::GatewayMetrics;
use anyhow::anyhow;
use std::future::Future;
use tokio::time;
use tracing::{error, info, instrument};
use volm_controller_core::{Authority, ClaimRecord, Error, Result, Selector};

/// Forwards volume deletions to the authority.
///
/// The claim is read from the authority rather than the cache so that the selector is evaluated
/// against the claim's current labels.
#[derive(Clone, Debug)]
pub struct Gateway<A> {
    authority: A,
    timeout: time::Duration,
    metrics: GatewayMetrics,
}

// === impl Gateway ===

impl<A> Gateway<A>
where
    A: Authority<ClaimRecord>,
{
    pub fn new(authority: A, timeout: time::Duration, metrics: GatewayMetrics) -> Self {
        Self {
            authority,
            timeout,
            metrics,
        }
    }

    #[instrument(skip(self, selector))]
    pub async fn delete_volume(&self, name: &str, selector: &Selector) -> Result<()> {
        let res = self.try_delete(name, selector).await;
        self.metrics.delete(match &res {
            Ok(()) => "deleted",
            Err(Error::NotFound { .. }) => "not_found",
            Err(Error::SelectorMismatch { .. }) => "selector_mismatch",
            Err(Error::Upstream(_)) => "error",
        });
        res
    }

    async fn try_delete(&self, name: &str, selector: &Selector) -> Result<()> {
        let claim = self
            .bounded("get", self.authority.get(name))
            .await?
            .ok_or_else(|| Error::not_found(name))?;

        selector
            .check(&claim.labels)
            .map_err(|mismatch| Error::SelectorMismatch {
                name: name.to_string(),
                mismatch,
            })?;

        // The claim may have been removed since it was read.
        if !self.bounded("delete", self.authority.delete(name)).await? {
            return Err(Error::not_found(name));
        }

        info!("Deleted");
        Ok(())
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        f: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T> {
        match time::timeout(self.timeout, f).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                error!(error = %format_args!("{e:#}"), "Failed to {op} claim");
                Err(Error::Upstream(e))
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "Timed out attempting to {op} claim");
                Err(Error::Upstream(anyhow!(
                    "{op} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}
