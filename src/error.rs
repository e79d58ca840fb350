//! Error taxonomy for distributed map/sketch requests.
//!
//! Three kinds of failure are distinguished:
//!
//! - **Construction errors** ([`SketchError::InvalidConfig`]) are raised locally, before any
//!   leaf is touched: non-positive top-K capacity, bucket descriptions that do not align with a
//!   quantization grid, a zero-sized thread pool, and so on.
//! - **Leaf failures** ([`SketchError::LeafFailures`]) carry one [`LeafFailure`] per failing
//!   shard, each tagged with the [`NodePath`] of the leaf so the caller can retry exactly that
//!   subtree.
//! - **Cancellation** ([`SketchError::Cancelled`]) terminates a stream and is never reported
//!   as a failure.
//!
//! Invariant violations (merging results built with different parameters) are programming
//! errors and panic inside the relevant `add`.

use crate::dataset::NodePath;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = SketchError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum SketchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{} leaf computation(s) failed; first failure at {}", .0.len(), first_path(.0))]
    LeafFailures(Vec<LeafFailure>),

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to load engine configuration from {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl SketchError {
    /// Shorthand for [`SketchError::InvalidConfig`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failed leaves, if this is a [`SketchError::LeafFailures`].
    #[must_use]
    pub fn failures(&self) -> &[LeafFailure] {
        match self {
            Self::LeafFailures(f) => f,
            _ => &[],
        }
    }
}

fn first_path(failures: &[LeafFailure]) -> String {
    failures
        .first()
        .map_or_else(|| "<none>".to_string(), |f| f.path.to_string())
}

/// A shard-local failure attributed to the leaf that produced it.
#[derive(Error, Debug)]
#[error("leaf {path} failed: {source}")]
pub struct LeafFailure {
    /// Position of the failing leaf in the dataset tree.
    pub path: NodePath,
    #[source]
    pub source: anyhow::Error,
}

impl LeafFailure {
    pub(crate) fn new(path: NodePath, source: anyhow::Error) -> Self {
        Self { path, source }
    }
}
