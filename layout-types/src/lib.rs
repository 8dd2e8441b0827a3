// SPDX-License-Identifier: GPL-3.0-only

//! Shared vocabulary for staged partition layout editing
//!
//! These types are used throughout the stack:
//!
//! - **layout-contracts**: collaborator traits speak in these types
//! - **layout-sys**: Linux backends produce raw records and capability tables
//! - **layout-core**: the partition tree, reconciler and operations build on them
//!
//! Nothing in here mutates a device or owns a partition tree.

pub mod common;
pub mod device;
pub mod filesystem;
pub mod partition;
pub mod report;
pub mod table;

pub use common::{DEFAULT_ALIGNMENT_BYTES, SectorRange, bytes_to_pretty};
pub use device::{DeviceInfo, Geometry};
pub use filesystem::{CapabilityTable, FileSystemType, FsCapability, Support};
pub use partition::{
    PartitionFlag, PartitionFlags, PartitionRole, PartitionRoles, RawPartitionKind,
    RawPartitionRecord, misreported_flags, role_name,
};
pub use report::Report;
pub use table::{TableInfo, TableType};
