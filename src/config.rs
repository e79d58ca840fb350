//! Engine configuration.
//!
//! [`EngineConfig`] controls how a [`Runner`](crate::Runner) executes requests: sequentially on
//! the calling thread or in parallel on a dedicated Rayon pool, how progress is weighted, and
//! whether leaf failures abort the request.
//!
//! Configurations can be built in code or loaded from JSON:
//!
//! ```
//! use ironsketch::config::{EngineConfig, ExecMode};
//!
//! let cfg = EngineConfig::from_json_str(r#"{ "mode": { "Parallel": { "threads": 4 } } }"#)?;
//! assert!(matches!(cfg.mode, ExecMode::Parallel { threads: Some(4) }));
//! assert!(!cfg.tolerate_leaf_failures);
//! # Ok::<_, ironsketch::SketchError>(())
//! ```

use crate::error::{Result, SketchError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where leaf computations run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecMode {
    /// One leaf at a time, on the thread consuming the result stream.
    Sequential,
    /// Leaves run concurrently on a Rayon pool (`None` = one thread per CPU).
    Parallel { threads: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { threads: None }
    }
}

/// How a leaf's share of `done` is computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressWeighting {
    /// Every leaf counts the same.
    LeafCount,
    /// Leaves count proportionally to their weight (row count for tables).
    #[default]
    ShardSize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: ExecMode,
    pub progress: ProgressWeighting,
    /// Keep going when a leaf fails: the leaf contributes `zero()` and is reported in
    /// [`SketchStream::failures`](crate::SketchStream::failures).
    pub tolerate_leaf_failures: bool,
    /// Deliver a snapshot after every leaf; when `false` only the final value is emitted.
    pub emit_partials: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecMode::default(),
            progress: ProgressWeighting::default(),
            tolerate_leaf_failures: false,
            emit_partials: true,
        }
    }
}

impl EngineConfig {
    /// Single-threaded configuration; handy for deterministic tests.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            mode: ExecMode::Sequential,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parallel(threads: Option<usize>) -> Self {
        Self {
            mode: ExecMode::Parallel { threads },
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: ProgressWeighting) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn tolerate_failures(mut self, tolerate: bool) -> Self {
        self.tolerate_leaf_failures = tolerate;
        self
    }

    #[must_use]
    pub const fn emit_partials(mut self, emit: bool) -> Self {
        self.emit_partials = emit;
        self
    }

    /// Check the configuration without building anything.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] for a zero-sized thread pool.
    pub fn validate(&self) -> Result<()> {
        if let ExecMode::Parallel { threads: Some(0) } = self.mode {
            return Err(SketchError::invalid("parallel mode needs at least one thread"));
        }
        Ok(())
    }

    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when the document is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| SketchError::invalid(format!("malformed engine configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    /// [`SketchError::Config`] when the file cannot be read or parsed, and
    /// [`SketchError::InvalidConfig`] when it fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let cfg = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|s| {
                serde_json::from_str::<Self>(&s)
                    .with_context(|| format!("parsing {}", path.display()))
            })
            .map_err(|source| SketchError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }
}
