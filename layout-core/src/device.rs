// SPDX-License-Identifier: GPL-3.0-only

use layout_types::DeviceInfo;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tree::PartitionTable;

/// A scanned device and the tree hanging off it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub info: DeviceInfo,

    /// `None` for a device without a partition table
    pub table: Option<PartitionTable>,
}

impl Device {
    pub fn new(info: DeviceInfo, table: Option<PartitionTable>) -> Self {
        Self { info, table }
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn sector_size(&self) -> u64 {
        self.info.logical_sector_size
    }

    pub fn table(&self) -> Result<&PartitionTable, ValidationError> {
        self.table.as_ref().ok_or(ValidationError::NoPartitionTable)
    }

    pub fn table_mut(&mut self) -> Result<&mut PartitionTable, ValidationError> {
        self.table.as_mut().ok_or(ValidationError::NoPartitionTable)
    }
}
