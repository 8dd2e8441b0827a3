// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Partition;

/// Identifier of a partition within its table. Stable for the lifetime of
/// the table, including while a pending operation holds the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Back-reference to a node's parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    Table,
    Partition(PartitionId),
}

/// A node that owns an ordered list of partitions
pub trait PartitionNode {
    fn children(&self) -> &[Partition];

    fn children_mut(&mut self) -> &mut Vec<Partition>;

    /// Insert keeping children sorted by first sector
    fn append(&mut self, partition: Partition) {
        let children = self.children_mut();
        let index = children
            .iter()
            .position(|child| child.first_sector > partition.first_sector)
            .unwrap_or(children.len());
        children.insert(index, partition);
    }

    /// Detach a direct child
    fn remove(&mut self, id: PartitionId) -> Option<Partition> {
        let children = self.children_mut();
        let index = children.iter().position(|child| child.id == id)?;
        Some(children.remove(index))
    }

    /// Children that are real partitions rather than free space
    fn real_children(&self) -> impl Iterator<Item = &Partition> {
        self.children().iter().filter(|child| !child.is_unallocated())
    }
}
