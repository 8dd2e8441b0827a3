// SPDX-License-Identifier: GPL-3.0-only

//! In-memory partition tree
//!
//! A [`PartitionTable`] owns its top-level partitions, and an extended
//! partition owns its logicals. Parents are referenced by [`NodeRef`], never
//! owned, so the tree has no cycles.

mod filesystem;
mod node;
mod partition;
mod table;

pub use filesystem::{CryptoState, FileSystem};
pub use node::{NodeRef, PartitionId, PartitionNode};
pub use partition::{MountState, Partition, PartitionState};
pub use table::PartitionTable;
