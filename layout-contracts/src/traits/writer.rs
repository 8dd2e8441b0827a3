// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{FileSystemType, RawPartitionKind, Report, SectorRange};
use serde::{Deserialize, Serialize};

use crate::BackendResult;

/// A partition table entry to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRequest {
    pub range: SectorRange,
    pub kind: RawPartitionKind,

    /// Used to pick the entry's type code
    pub fs: FileSystemType,
}

/// What the backend assigned to a freshly written entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPartition {
    pub path: String,
    pub number: u32,
}

/// Mutating partition table access
pub trait PartitionTableWriter: Send + Sync {
    fn create_partition(
        &self,
        report: &mut Report,
        device: &str,
        request: &PartitionRequest,
    ) -> BackendResult<CreatedPartition>;

    fn delete_partition(&self, report: &mut Report, device: &str, number: u32)
    -> BackendResult<()>;

    fn set_partition_geometry(
        &self,
        report: &mut Report,
        device: &str,
        number: u32,
        range: SectorRange,
    ) -> BackendResult<()>;
}
