use crate::record::IntoRecord;
use anyhow::{anyhow, Context, Result};
use futures::prelude::*;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, DeleteParams, ListParams, WatchEvent, WatchParams},
    Client, Resource,
};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, trace};
use volm_controller_core::{Authority, Event, EventStream, Snapshot};

/// Serves a namespaced collection from the Kubernetes API.
#[derive(Clone)]
pub struct KubeAuthority<K> {
    api: Api<K>,
}

impl<K> KubeAuthority<K> {
    /// Limits the amount of time a watch can be idle before being reset.
    ///
    /// Must be less than 295 or Kubernetes throws an error.
    const WATCH_TIMEOUT_SECS: u32 = 290;
}

impl<K> KubeAuthority<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    pub fn namespaced(client: Client, ns: &str) -> Self {
        Self {
            api: Api::namespaced(client, ns),
        }
    }
}

impl<K> fmt::Debug for KubeAuthority<K>
where
    K: Resource,
    K::DynamicType: Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeAuthority")
            .field("kind", &K::kind(&Default::default()))
            .finish()
    }
}

#[async_trait::async_trait]
impl<K> Authority<K::Record> for KubeAuthority<K>
where
    K: IntoRecord + Resource + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    K::Record: Send + 'static,
{
    async fn list(&self) -> Result<Snapshot<K::Record>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .context("failed to list resources")?;
        trace!(items = list.items.len(), version = ?list.metadata.resource_version, "Listed");
        Ok(Snapshot {
            version: list.metadata.resource_version,
            items: list.items.into_iter().map(IntoRecord::into_record).collect(),
        })
    }

    async fn watch(&self, version: &str) -> Result<EventStream<K::Record>> {
        let params = WatchParams::default().timeout(Self::WATCH_TIMEOUT_SECS);
        let events = self
            .api
            .watch(&params, version)
            .await
            .context("failed to open watch")?;
        debug!(%version, "Watching");

        let events = events.filter_map(|ev| {
            future::ready(match ev {
                Ok(WatchEvent::Added(k)) => Some(Ok(Event::Added(k.into_record()))),
                Ok(WatchEvent::Modified(k)) => Some(Ok(Event::Updated(k.into_record()))),
                Ok(WatchEvent::Deleted(k)) => Some(Ok(Event::Removed(k.into_record()))),
                Ok(WatchEvent::Bookmark(_)) => None,
                Ok(WatchEvent::Error(e)) => {
                    Some(Err(anyhow!("watch failed ({}): {}", e.code, e.message)))
                }
                Err(error) => Some(Err(anyhow::Error::new(error).context("watch stream failed"))),
            })
        });
        Ok(events.boxed())
    }

    async fn get(&self, name: &str) -> Result<Option<K::Record>> {
        let resource = self
            .api
            .get_opt(name)
            .await
            .with_context(|| format!("failed to get {name}"))?;
        Ok(resource.map(IntoRecord::into_record))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(rsp)) if rsp.code == 404 => Ok(false),
            Err(error) => Err(anyhow::Error::new(error).context(format!("failed to delete {name}"))),
        }
    }
}
