// SPDX-License-Identifier: GPL-3.0-only

//! Staged partition layout editing
//!
//! A device is scanned into a [`PartitionTable`] tree by the [`Reconciler`].
//! Edits are expressed as operations that are previewed against the tree and
//! queued on an [`OperationStack`]; nothing reaches the device until
//! [`OperationStack::apply`] runs each operation's jobs through the
//! collaborators in [`Backends`].

pub mod alignment;
pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod job;
pub mod operation;
pub mod reconcile;
pub mod stack;
pub mod tree;

#[cfg(test)]
mod fake;

pub use alignment::Alignment;
pub use backend::Backends;
pub use config::{AlignmentConfig, CoreConfig};
pub use device::Device;
pub use error::{CoreError, Result, ValidationError};
pub use job::{Job, JobContext};
pub use operation::{
    CheckOperation, CopyOperation, CreateOperation, DeleteOperation, Operation, OperationId,
    OperationOutcome, OperationStatus, ResizeOperation, SetLabelOperation, ShredAction,
    can_delete, check_delete,
};
pub use reconcile::{Reconciler, Reconciliation, ScanOutcome, is_sector_based};
pub use stack::{ApplyEntry, ApplyReport, OperationStack};
pub use tree::{
    CryptoState, FileSystem, MountState, NodeRef, Partition, PartitionId, PartitionNode,
    PartitionState, PartitionTable,
};
