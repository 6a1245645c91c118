//! Symmetric difference between stored and desired edge sets

use super::edge::RelationEdge;
use crate::records::RecordId;
use std::collections::HashSet;

/// The mutation set a reconciliation must apply.
#[derive(Debug, Clone, Default)]
pub struct RelationDelta {
    pub added: Vec<RelationEdge>,
    pub removed: Vec<RelationEdge>,
}

impl RelationDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Deduplicated target ids whose inbound edge count moves
    pub fn changed_targets(&self) -> Vec<RecordId> {
        let mut seen = HashSet::new();
        self.added
            .iter()
            .chain(self.removed.iter())
            .filter(|e| seen.insert(e.target))
            .map(|e| e.target)
            .collect()
    }
}

/// Compute the symmetric difference between the currently stored edges of a
/// source and the edges its content now supports.
pub fn diff(current: &HashSet<RelationEdge>, desired: &HashSet<RelationEdge>) -> RelationDelta {
    RelationDelta {
        added: desired.difference(current).copied().collect(),
        removed: current.difference(desired).copied().collect(),
    }
}
