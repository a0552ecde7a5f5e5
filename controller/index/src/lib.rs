//! Volume index
//!
//! Mirrors a namespace's `PersistentVolumeClaim` and `Pod` resources into two in-memory stores and
//! answers queries that join them:
//!
//! - Each [`Store`] maps a resource name to its last-known record.
//! - Each [`Subscription`] keeps a store consistent with the authority by listing the collection,
//!   applying watch events, and periodically re-listing to heal dropped events.
//! - The [`Index`] reads snapshots of both stores to produce volume views. Queries never block on
//!   the authority; while a subscription is disconnected they serve the last-known state.
//! - The [`Gateway`] forwards deletions to the authority after checking the live claim against the
//!   selector.
//!
//! ```text
//! [ Authority ] -> [ Subscription ] -> [ Store ] <- [ Index ] <- queries
//! [ Authority ] <------------------------------------ [ Gateway ] <- deletions
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod gateway;
mod index;
pub mod metrics;
mod store;
pub mod subscription;


pub use self::{
    gateway::Gateway,
    index::Index,
    store::{SharedStore, Store},
    subscription::Subscription,
};
