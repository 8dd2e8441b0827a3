//! Device identity and geometry
//!
//! A `DeviceInfo` is produced once per scan and never mutated afterwards;
//! the partition tree that hangs off a device lives in `layout-core`.

use serde::{Deserialize, Serialize};

/// Legacy CHS geometry as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Geometry {
    pub heads: u32,
    pub sectors_per_track: u32,
    pub cylinders: u64,
}

impl Geometry {
    /// Sectors per cylinder
    pub fn cylinder_size(&self) -> u64 {
        u64::from(self.heads) * u64::from(self.sectors_per_track)
    }

    /// Total addressable sectors according to the geometry
    pub fn total_sectors(&self) -> u64 {
        self.cylinder_size().saturating_mul(self.cylinders)
    }
}

/// Identity of a physical or virtual block device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device node path (e.g., "/dev/sda")
    pub path: String,

    /// Disk model name (may be empty)
    pub model: String,

    pub geometry: Geometry,

    /// Logical sector size in bytes
    pub logical_sector_size: u64,

    /// Total number of logical sectors
    pub total_sectors: u64,

    /// Alignment granularity in sectors as reported by the backend, if any
    pub alignment_sectors: Option<u64>,
}

impl DeviceInfo {
    /// Capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.total_sectors.saturating_mul(self.logical_sector_size)
    }

    /// Get a human-readable display name for the device
    pub fn display_name(&self) -> String {
        if !self.model.is_empty() {
            self.model.clone()
        } else {
            self.path
                .split('/')
                .next_back()
                .unwrap_or(&self.path)
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_derives_cylinder_size() {
        let geometry = Geometry {
            heads: 255,
            sectors_per_track: 63,
            cylinders: 10,
        };
        assert_eq!(geometry.cylinder_size(), 16065);
        assert_eq!(geometry.total_sectors(), 160650);
    }

    #[test]
    fn display_name_falls_back_to_node() {
        let device = DeviceInfo {
            path: "/dev/nvme0n1".to_string(),
            model: String::new(),
            geometry: Geometry::default(),
            logical_sector_size: 512,
            total_sectors: 2048,
            alignment_sectors: None,
        };
        assert_eq!(device.display_name(), "nvme0n1");
        assert_eq!(device.capacity(), 1024 * 1024);
    }
}
