// SPDX-License-Identifier: GPL-3.0-only

use layout_contracts::BackendError;
use layout_types::{FileSystemType, FsCapability};
use thiserror::Error;

use crate::tree::PartitionId;

/// An operation could not be constructed or staged against the current tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Device has no partition table")]
    NoPartitionTable,

    #[error("Partition {0} not found")]
    NotFound(PartitionId),

    #[error("{0} is mounted")]
    Mounted(String),

    #[error("Partition {0} is free space")]
    NotAPartition(PartitionId),

    #[error("Extended partition {0} would no longer contain all of its logical partitions")]
    ChildrenOutside(PartitionId),

    #[error("Cannot delete {path}: {reason}")]
    CannotDelete { path: String, reason: &'static str },

    #[error("Invalid sector range {first}..={last}")]
    InvalidRange { first: u64, last: u64 },

    #[error("Sectors {first}..={last} lie outside the usable range {lower}..={upper}")]
    OutOfBounds {
        first: u64,
        last: u64,
        lower: u64,
        upper: u64,
    },

    #[error("Sectors {first}..={last} overlap an existing partition")]
    Overlap { first: u64, last: u64 },

    #[error("The partition table allows at most {0} primary partitions")]
    TooManyPrimaries(u32),

    #[error("The partition table already has an extended partition")]
    SecondExtended,

    #[error("The partition table does not support extended partitions")]
    ExtendedNotSupported,

    #[error("Logical partitions must lie inside an extended partition")]
    LogicalOutsideExtended,

    #[error("{fs:?} does not support {capability:?}")]
    Unsupported {
        fs: FileSystemType,
        capability: FsCapability,
    },

    #[error("New size of {requested} sectors is below the {used} sectors in use")]
    TooSmall { requested: u64, used: u64 },

    #[error("Partition {0} has not been written yet")]
    Uncommitted(PartitionId),

    #[error("Partition {0} is already claimed by a pending operation")]
    AlreadyClaimed(PartitionId),

    #[error("Operation does not change anything")]
    NothingToDo,

    #[error("Operation cannot be {action} while {status:?}")]
    InvalidState {
        action: &'static str,
        status: crate::operation::OperationStatus,
    },
}

/// Errors surfaced by `layout-core`
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("No pending operation to undo")]
    NothingToUndo,

    #[error("No undone operation to redo")]
    NothingToRedo,
}

pub type Result<T> = std::result::Result<T, CoreError>;
