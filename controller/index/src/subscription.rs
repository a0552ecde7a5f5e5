use crate::{metrics::SubscriptionMetrics, store::SharedStore};
use futures::prelude::*;
use thiserror::Error;
use tokio::{sync::watch, time};
use tracing::{debug, info, trace, warn};
use volm_controller_core::{Authority, Event, EventStream, Named};

/// The version used to open a watch when a listing does not report one.
const UNVERSIONED: &str = "0";

/// The lifecycle of a [`Subscription`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Listing the collection; the store still holds the prior snapshot.
    Connecting,

    /// The store reflects a full listing and watch events are being applied.
    Synced,

    /// A list or watch attempt failed; the store holds the last-known state.
    Disconnected,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// How often the collection is re-listed to correct for dropped events.
    pub resync_interval: time::Duration,

    /// Bounds each call to the authority.
    pub request_timeout: time::Duration,

    /// How long to wait before reconnecting after a failure.
    pub reconnect_backoff: time::Duration,
}

/// Keeps a [`Store`](crate::Store) consistent with an [`Authority`] by listing the collection and
/// then applying watch events.
///
/// Every `resync_interval` the collection is listed again and the store's contents replaced. The
/// watch is then reopened from the new listing's version so that events buffered on the prior
/// watch are never applied on top of a newer snapshot.
pub struct Subscription<T, A> {
    resource: &'static str,
    authority: A,
    store: SharedStore<T>,
    config: Config,
    state: watch::Sender<State>,
    metrics: SubscriptionMetrics,
}

/// A failure of the list-then-watch protocol. These are recovered by reconnecting and are never
/// surfaced to readers of the store.
#[derive(Debug, Error)]
enum StreamError {
    #[error("failed to list resources: {0:#}")]
    List(#[source] anyhow::Error),

    #[error("failed to watch resources: {0:#}")]
    Watch(#[source] anyhow::Error),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, time::Duration),
}

enum Outcome {
    Resync,
    Disconnected(StreamError),
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            resync_interval: time::Duration::from_secs(60),
            request_timeout: time::Duration::from_secs(30),
            reconnect_backoff: time::Duration::from_secs(1),
        }
    }
}

// === impl Subscription ===

impl<T, A> Subscription<T, A>
where
    T: Named + Send + Sync + 'static,
    A: Authority<T>,
{
    pub fn new(
        resource: &'static str,
        authority: A,
        store: SharedStore<T>,
        config: Config,
        metrics: SubscriptionMetrics,
    ) -> Self {
        let (state, _) = watch::channel(State::Connecting);
        Self {
            resource,
            authority,
            store,
            config,
            state,
            metrics,
        }
    }

    /// Observes state transitions.
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Runs the subscription indefinitely.
    pub async fn run(self) {
        loop {
            let outcome = match self.sync().await {
                Ok(events) => self.stream(events).await,
                Err(error) => Outcome::Disconnected(error),
            };

            match outcome {
                Outcome::Resync => {
                    debug!("Resyncing");
                }
                Outcome::Disconnected(error) => {
                    warn!(%error, "Disconnected");
                    self.metrics.disconnect(self.resource);
                    self.transition(State::Disconnected);
                    time::sleep(self.config.reconnect_backoff).await;
                }
            }
        }
    }

    /// Lists the collection into the store and opens a watch from the listing's version.
    async fn sync(&self) -> Result<EventStream<T>, StreamError> {
        self.transition(State::Connecting);

        let snapshot = time::timeout(self.config.request_timeout, self.authority.list())
            .await
            .map_err(|_| StreamError::Timeout("list", self.config.request_timeout))?
            .map_err(StreamError::List)?;
        let version = snapshot
            .version
            .unwrap_or_else(|| UNVERSIONED.to_string());

        let resources = snapshot.items.len();
        self.store.replace(snapshot.items);
        self.metrics.relist(self.resource);
        self.transition(State::Synced);
        debug!(resources, %version, "Listed");

        time::timeout(self.config.request_timeout, self.authority.watch(&version))
            .await
            .map_err(|_| StreamError::Timeout("watch", self.config.request_timeout))?
            .map_err(StreamError::Watch)
    }

    /// Applies events until the resync interval elapses or the watch fails.
    ///
    /// A watch that closes sooner than `reconnect_backoff` after opening delays the relist until
    /// the backoff has elapsed.
    async fn stream(&self, mut events: EventStream<T>) -> Outcome {
        let opened = time::Instant::now();
        let resync = time::sleep(self.config.resync_interval);
        tokio::pin!(resync);

        loop {
            tokio::select! {
                biased;

                () = &mut resync => return Outcome::Resync,

                ev = events.next() => match ev {
                    Some(Ok(ev)) => self.apply(ev),
                    Some(Err(error)) => return Outcome::Disconnected(StreamError::Watch(error)),
                    None => {
                        let lived = opened.elapsed();
                        debug!(?lived, "Watch closed");
                        if let Some(wait) = self.config.reconnect_backoff.checked_sub(lived) {
                            time::sleep(wait).await;
                        }
                        return Outcome::Resync;
                    }
                },
            }
        }
    }

    fn apply(&self, ev: Event<T>) {
        let kind = ev.kind();
        trace!(kind, name = %ev.resource().name(), "Applying");
        self.metrics.event(self.resource, kind);
        match ev {
            Event::Added(resource) | Event::Updated(resource) => self.store.upsert(resource),
            Event::Removed(resource) => self.store.remove(resource.name()),
        }
    }

    fn transition(&self, state: State) {
        let prior = self.state.send_replace(state);
        if prior == state {
            return;
        }

        // Periodic resyncs cycle between connecting and synced; only recovery is notable.
        if prior == State::Disconnected || state == State::Disconnected {
            info!(?prior, ?state, "Subscription state changed");
        } else {
            debug!(?prior, ?state, "Subscription state changed");
        }
    }
}
