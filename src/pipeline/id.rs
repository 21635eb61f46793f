//! Identity types for the stage graph.
//!
//! Graph edges never own the stages they point at. They are `StageId`
//! values: direct indices into `StageGraph::slots`, the one list that holds
//! the strong references.

use serde::Serialize;
use std::fmt;

/// Index into `StageGraph::slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StageId(pub u32);

impl StageId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
