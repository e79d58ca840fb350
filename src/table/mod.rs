//! In-process columnar shards.
//!
//! A [`Table`] is a set of shared, immutable [`Column`]s plus a [`MembershipSet`] naming the
//! active rows. Maps that filter or sample rows return a new table over the same columns.
//!
//! ```
//! use ironsketch::table::{Column, Table};
//!
//! let t = Table::new(vec![
//!     Column::doubles("x", vec![1.0, 2.0, 3.0, 4.0]),
//!     Column::strings("name", ["a", "b", "c", "d"]),
//! ])?;
//! assert_eq!(t.row_count(), 4);
//! let halves = t.split(2);
//! assert_eq!(halves[1].members().first(), Some(2));
//! # Ok::<_, ironsketch::SketchError>(())
//! ```

mod column;
mod membership;

pub use column::{Column, ColumnKind, Value};
pub use membership::{MembershipIter, MembershipSet};

use crate::dataset::PartitionedDataset;
use crate::error::{Result, SketchError};
use anyhow::anyhow;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Table {
    columns: Arc<Vec<Arc<Column>>>,
    members: MembershipSet,
}

impl Table {
    /// Table over `columns` with every row active.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when column lengths differ or a name repeats.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map_or(0, Column::len);
        let mut names = HashSet::new();
        for c in &columns {
            if c.len() != rows {
                return Err(SketchError::invalid(format!(
                    "column {} has {} rows, expected {rows}",
                    c.name(),
                    c.len()
                )));
            }
            if !names.insert(c.name().to_string()) {
                return Err(SketchError::invalid(format!("duplicate column {}", c.name())));
            }
        }
        Ok(Self {
            columns: Arc::new(columns.into_iter().map(Arc::new).collect()),
            members: MembershipSet::full(rows),
        })
    }

    /// Column names and kinds, in order.
    #[must_use]
    pub fn schema(&self) -> Vec<(&str, ColumnKind)> {
        self.columns.iter().map(|c| (c.name(), c.kind())).collect()
    }

    /// Look up a column by name.
    ///
    /// # Errors
    /// Names the missing column; used from leaf operators, so the error is an `anyhow` one.
    pub fn column(&self, name: &str) -> anyhow::Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .map(|c| &**c)
            .ok_or_else(|| anyhow!("no column named {name:?}"))
    }

    #[must_use]
    pub const fn members(&self) -> &MembershipSet {
        &self.members
    }

    /// Number of active rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.members.len()
    }

    /// Same columns, different active rows.
    #[must_use]
    pub fn with_members(&self, members: MembershipSet) -> Self {
        Self {
            columns: Arc::clone(&self.columns),
            members,
        }
    }

    /// Keep only the named columns, in the given order.
    ///
    /// # Errors
    /// When a name does not exist.
    pub fn project(&self, names: &[String]) -> anyhow::Result<Self> {
        let mut kept = Vec::with_capacity(names.len());
        for name in names {
            let col = self
                .columns
                .iter()
                .find(|c| c.name() == name.as_str())
                .ok_or_else(|| anyhow!("no column named {name:?}"))?;
            kept.push(Arc::clone(col));
        }
        Ok(Self {
            columns: Arc::new(kept),
            members: self.members.clone(),
        })
    }

    /// Partition the active rows into at most `n` contiguous shards sharing this table's columns.
    #[must_use]
    pub fn split(&self, n: usize) -> Vec<Self> {
        self.members
            .split(n)
            .into_iter()
            .map(|m| self.with_members(m))
            .collect()
    }
}

impl PartitionedDataset<Table> {
    /// Balanced tree over `tables`, each leaf weighted by its active row count.
    ///
    /// # Errors
    /// [`SketchError::InvalidConfig`] when `fanout < 2`.
    pub fn from_tables(tables: Vec<Table>, fanout: usize) -> Result<Self> {
        let weighted = tables
            .into_iter()
            .map(|t| {
                let w = t.row_count() as u64;
                (t, w)
            })
            .collect();
        Self::from_weighted_leaves(weighted, fanout)
    }
}
