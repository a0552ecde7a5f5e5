#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authority;
pub mod labels;
mod record;
mod view;

pub use self::{
    authority::{Authority, Event, EventStream, Snapshot},
    labels::{Labels, Mismatch, Selector, SelectorError},
    record::{ClaimRecord, Named, WorkloadPhase, WorkloadRecord},
    view::{VolumeView, WorkloadSummary},
};
pub use chrono::{offset::Utc, DateTime};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Describes why a volume could not be read or deleted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{name} not found")]
    NotFound { name: String },

    /// The volume exists but is filtered out by the configured selector.
    #[error("{name} is not selected: {mismatch}")]
    SelectorMismatch { name: String, mismatch: Mismatch },

    /// Displays the full cause chain; it is not repeated as a source.
    #[error("upstream request failed: {0:#}")]
    Upstream(anyhow::Error),
}

impl Error {
    pub fn not_found(name: impl ToString) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_selector_mismatch(&self) -> bool {
        matches!(self, Self::SelectorMismatch { .. })
    }
}
