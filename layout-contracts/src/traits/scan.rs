// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{DeviceInfo, RawPartitionRecord, TableInfo};

use crate::BackendResult;

/// Read-only access to device geometry and partition table metadata
pub trait DeviceScanner: Send + Sync {
    fn probe_device(&self, path: &str) -> BackendResult<DeviceInfo>;

    /// Table metadata, or `None` when the device carries no partition table
    fn read_table(&self, device: &DeviceInfo) -> BackendResult<Option<TableInfo>>;

    /// Raw partition entries in whatever order the backend produces them
    fn list_raw_partitions(&self, device: &DeviceInfo) -> BackendResult<Vec<RawPartitionRecord>>;

    /// Whether the node is in use (mounted, held open, or holding children)
    fn is_busy(&self, path: &str) -> bool;
}
