use anyhow::Result;
use futures::prelude::*;
use std::{pin::Pin, sync::Arc};

/// An unbounded stream of changes to a watched collection.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<Event<T>>> + Send + 'static>>;

/// A single change to a watched collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Event<T> {
    Added(T),
    Updated(T),
    Removed(T),
}

/// The full contents of a collection at a point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<T> {
    /// The version at which the listing was taken. A watch opened from this version observes every
    /// change that is not already reflected in `items`.
    pub version: Option<String>,
    pub items: Vec<T>,
}

/// The external system of record for a single namespaced collection.
///
/// Implementations must not cache: every call reflects the authority's current state.
#[async_trait::async_trait]
pub trait Authority<T>: Send + Sync {
    async fn list(&self) -> Result<Snapshot<T>>;

    async fn watch(&self, version: &str) -> Result<EventStream<T>>;

    /// Returns `None` when no resource has the given name.
    async fn get(&self, name: &str) -> Result<Option<T>>;

    /// Returns `false` when no resource has the given name.
    async fn delete(&self, name: &str) -> Result<bool>;
}

// === impl Event ===

impl<T> Event<T> {
    pub fn resource(&self) -> &T {
        match self {
            Self::Added(t) | Self::Updated(t) | Self::Removed(t) => t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated(_) => "updated",
            Self::Removed(_) => "removed",
        }
    }
}

// === impl Arc ===

#[async_trait::async_trait]
impl<T, A> Authority<T> for Arc<A>
where
    T: Send + 'static,
    A: Authority<T> + ?Sized,
{
    async fn list(&self) -> Result<Snapshot<T>> {
        (**self).list().await
    }

    async fn watch(&self, version: &str) -> Result<EventStream<T>> {
        (**self).watch(version).await
    }

    async fn get(&self, name: &str) -> Result<Option<T>> {
        (**self).get(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        (**self).delete(name).await
    }
}
