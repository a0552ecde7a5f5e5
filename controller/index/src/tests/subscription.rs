use super::*;
use crate::{
    metrics::SubscriptionMetrics,
    subscription::{Config, State},
    SharedStore, Store, Subscription,
};
use std::{collections::BTreeSet, sync::Arc};
use tokio::{sync::watch, task::JoinHandle, time};

const RESYNC: time::Duration = time::Duration::from_secs(60);
const TIMEOUT: time::Duration = time::Duration::from_secs(10);
const BACKOFF: time::Duration = time::Duration::from_secs(1);

struct Running {
    store: SharedStore<ClaimRecord>,
    state: watch::Receiver<State>,
    task: JoinHandle<()>,
}

fn spawn(authority: Arc<FakeAuthority<ClaimRecord>>) -> Running {
    let store = Store::shared();
    let subscription = Subscription::new(
        "persistentvolumeclaims",
        authority,
        store.clone(),
        Config {
            resync_interval: RESYNC,
            request_timeout: TIMEOUT,
            reconnect_backoff: BACKOFF,
        },
        SubscriptionMetrics::default(),
    );
    let state = subscription.state();
    let task = tokio::spawn(subscription.run());
    Running { store, state, task }
}

fn names(store: &Store<ClaimRecord>) -> BTreeSet<String> {
    store.list().iter().map(|c| c.name.clone()).collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn lists_then_applies_events() {
    let _tracing = trace_init();
    let authority = Arc::new(FakeAuthority::new(vec![
        mk_claim("pvc-1", None),
        mk_claim("pvc-2", None),
    ]));
    let Running { store, state, task } = spawn(authority.clone());

    until(|| *state.borrow() == State::Synced && authority.watches() == 1).await;
    assert_eq!(names(&store), set(&["pvc-1", "pvc-2"]));
    assert_eq!(*authority.watch_versions.lock(), vec!["1".to_string()]);

    authority.publish(Event::Added(mk_claim("pvc-3", None)));
    authority.publish(Event::Updated(mk_claim("pvc-1", Some(("team", "a")))));
    authority.publish(Event::Removed(mk_claim("pvc-2", None)));
    until(|| store.get("pvc-2").is_none()).await;

    assert_eq!(names(&store), set(&["pvc-1", "pvc-3"]));
    assert_eq!(
        store.get("pvc-1").expect("pvc-1 must exist").labels.get("team"),
        Some("a")
    );
    assert_eq!(calls(&authority.list_calls), 1);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn resync_heals_dropped_events() {
    let authority = Arc::new(FakeAuthority::new(vec![
        mk_claim("pvc-1", None),
        mk_claim("pvc-2", None),
    ]));
    let Running { store, state, task } = spawn(authority.clone());
    until(|| *state.borrow() == State::Synced && authority.watches() == 1).await;

    // The authority changes without any events reaching the watch.
    authority.set_silently(vec![mk_claim("pvc-2", None), mk_claim("pvc-9", None)]);
    time::advance(RESYNC - BACKOFF).await;
    tokio::task::yield_now().await;
    assert_eq!(names(&store), set(&["pvc-1", "pvc-2"]));

    time::advance(BACKOFF).await;
    until(|| authority.watches() == 2).await;

    assert_eq!(names(&store), set(&["pvc-2", "pvc-9"]));
    assert_eq!(calls(&authority.list_calls), 2);
    assert_eq!(
        *authority.watch_versions.lock(),
        vec!["1".to_string(), "2".to_string()]
    );
    assert!(
        !authority.watch_is_open(0),
        "the prior watch must be dropped on resync"
    );
    assert!(authority.watch_is_open(1));
    assert_eq!(*state.borrow(), State::Synced);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_watch_failure() {
    let _tracing = trace_init();
    let authority = Arc::new(FakeAuthority::new(vec![mk_claim("pvc-1", None)]));
    let Running { store, state, task } = spawn(authority.clone());
    until(|| *state.borrow() == State::Synced && authority.watches() == 1).await;

    authority.fail_watch();
    until(|| *state.borrow() == State::Disconnected).await;

    // While disconnected, the last-known state is still served.
    authority.set_silently(vec![mk_claim("pvc-2", None)]);
    assert_eq!(names(&store), set(&["pvc-1"]));

    time::advance(BACKOFF).await;
    until(|| *state.borrow() == State::Synced && authority.watches() == 2).await;
    assert_eq!(names(&store), set(&["pvc-2"]));
    assert_eq!(calls(&authority.list_calls), 2);

    authority.publish(Event::Added(mk_claim("pvc-3", None)));
    until(|| store.get("pvc-3").is_some()).await;

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn retries_failed_listing() {
    let authority = Arc::new(FakeAuthority::new(vec![mk_claim("pvc-1", None)]));
    authority.list_failures.store(2, Ordering::SeqCst);
    let Running { store, state, task } = spawn(authority.clone());

    until(|| *state.borrow() == State::Disconnected).await;
    assert!(store.is_empty());
    assert!(authority.watches() == 0, "no watch may open before a listing");

    time::advance(BACKOFF).await;
    until(|| calls(&authority.list_calls) == 2).await;
    assert_eq!(*state.borrow(), State::Disconnected);

    time::advance(BACKOFF).await;
    until(|| *state.borrow() == State::Synced && authority.watches() == 1).await;
    assert_eq!(calls(&authority.list_calls), 3);
    assert_eq!(names(&store), set(&["pvc-1"]));

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn listing_is_bounded() {
    let authority = Arc::new(FakeAuthority::new(vec![mk_claim("pvc-1", None)]));
    authority.hang.store(true, Ordering::SeqCst);
    let Running { store, state, task } = spawn(authority.clone());

    until(|| calls(&authority.list_calls) == 1).await;
    assert_eq!(*state.borrow(), State::Connecting);

    time::advance(TIMEOUT).await;
    until(|| *state.borrow() == State::Disconnected).await;
    assert!(store.is_empty());

    authority.hang.store(false, Ordering::SeqCst);
    time::advance(BACKOFF).await;
    until(|| *state.borrow() == State::Synced).await;
    assert_eq!(names(&store), set(&["pvc-1"]));

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn closed_watch_relists() {
    let authority = Arc::new(FakeAuthority::new(vec![mk_claim("pvc-1", None)]));
    let Running { store, state, task } = spawn(authority.clone());
    until(|| *state.borrow() == State::Synced && authority.watches() == 1).await;

    // A watch that ends after a normal lifetime is reopened without delay.
    time::advance(RESYNC / 2).await;
    authority.set_silently(vec![mk_claim("pvc-2", None)]);
    authority.close_watch();
    until(|| authority.watches() == 2).await;

    assert_eq!(calls(&authority.list_calls), 2);
    assert_eq!(names(&store), set(&["pvc-2"]));
    assert_eq!(*state.borrow(), State::Synced);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn short_lived_watches_back_off() {
    let authority = Arc::new(FakeAuthority::new(vec![mk_claim("pvc-1", None)]));
    authority.empty_watches.store(true, Ordering::SeqCst);
    let Running { store, task, .. } = spawn(authority.clone());

    until(|| authority.watch_versions.lock().len() == 1).await;
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
    assert_eq!(calls(&authority.list_calls), 1);
    assert_eq!(names(&store), set(&["pvc-1"]));

    for n in 2..=5 {
        time::advance(BACKOFF).await;
        until(|| authority.watch_versions.lock().len() == n).await;
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls(&authority.list_calls), n);
    }

    task.abort();
    assert!(task.await.expect_err("task must be aborted").is_cancelled());
}
