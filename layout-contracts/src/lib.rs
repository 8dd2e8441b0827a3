// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator contracts consumed by `layout-core`
//!
//! Every call that touches a device, a filesystem tool or the mount table
//! goes through one of these traits. Mutating calls write what they did
//! into a [`Report`](layout_types::Report) and return `Err` on failure.

pub mod error;
pub mod traits;

pub use error::{BackendError, BackendErrorKind, BackendResult};
pub use traits::{
    BlockIo, CreatedPartition, CryptoContainers, DeviceScanner, FileSystemTools, FillPattern,
    MountTable, PartitionRequest, PartitionTableWriter, SectorCopy,
};
