// SPDX-License-Identifier: GPL-3.0-only

use layout_types::Report;
use serde::{Deserialize, Serialize};

use crate::BackendResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    Zero,
    Random,
}

/// Sector copy between two nodes (or within one). Offsets and length are in
/// sectors of `sector_size` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorCopy {
    pub source: String,
    pub source_offset: u64,
    pub target: String,
    pub target_offset: u64,
    pub length: u64,
    pub sector_size: u64,
}

impl SectorCopy {
    /// Source and target ranges share sectors on the same node
    pub fn overlaps(&self) -> bool {
        self.source == self.target
            && self.source_offset < self.target_offset + self.length
            && self.target_offset < self.source_offset + self.length
    }
}

/// Raw block-level access to a device node
pub trait BlockIo: Send + Sync {
    /// Erase every filesystem signature on the node
    fn clobber_signatures(&self, report: &mut Report, path: &str) -> BackendResult<()>;

    /// Overwrite the whole node
    fn fill(&self, report: &mut Report, path: &str, pattern: FillPattern) -> BackendResult<()>;

    fn copy_sectors(&self, report: &mut Report, copy: &SectorCopy) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(source_offset: u64, target_offset: u64) -> SectorCopy {
        SectorCopy {
            source: "/dev/sda".to_string(),
            source_offset,
            target: "/dev/sda".to_string(),
            target_offset,
            length: 100,
            sector_size: 512,
        }
    }

    #[test]
    fn overlap_is_detected_on_the_same_node_only() {
        assert!(copy(0, 50).overlaps());
        assert!(copy(50, 0).overlaps());
        assert!(!copy(0, 100).overlaps());

        let mut other = copy(0, 50);
        other.target = "/dev/sdb".to_string();
        assert!(!other.overlaps());
    }
}
