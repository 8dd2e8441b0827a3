//! Partition table metadata as reported by a backend

use serde::{Deserialize, Serialize};

use crate::{Geometry, SectorRange};

/// Partition table type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// MBR/DOS with cylinder-based alignment
    Msdos,

    /// MBR/DOS whose partitions are sector aligned
    MsdosSectorBased,

    /// GUID Partition Table
    Gpt,

    /// Any other label the backend can report (e.g. "sun", "bsd")
    Other,
}

impl TableType {
    /// Parse from a backend label name
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt" => Self::Gpt,
            "dos" | "mbr" | "msdos" => Self::Msdos,
            "msdos_sectorbased" => Self::MsdosSectorBased,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Msdos => "msdos",
            Self::MsdosSectorBased => "msdos_sectorbased",
            Self::Gpt => "gpt",
            Self::Other => "other",
        }
    }

    pub fn is_msdos(&self) -> bool {
        matches!(self, Self::Msdos | Self::MsdosSectorBased)
    }

    /// Only MS-DOS style tables know extended/logical partitions
    pub fn supports_extended(&self) -> bool {
        self.is_msdos()
    }
}

/// Table-level metadata for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_type: TableType,

    /// First sector a partition may cover
    pub first_usable: u64,

    /// Last sector a partition may cover
    pub last_usable: u64,

    /// Maximum number of primary slots (including an extended partition)
    pub max_primaries: u32,
}

impl TableInfo {
    /// Usable bounds for a legacy MS-DOS table when the backend reports none:
    /// the first track is reserved and the end is where the geometry ends.
    pub fn msdos_bounds(geometry: &Geometry) -> SectorRange {
        let first = u64::from(geometry.sectors_per_track);
        let last = geometry.total_sectors().saturating_sub(1);
        SectorRange::new(first, last)
    }

    pub fn usable(&self) -> SectorRange {
        SectorRange::new(self.first_usable, self.last_usable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_labels() {
        assert_eq!(TableType::parse("dos"), TableType::Msdos);
        assert_eq!(TableType::parse("GPT"), TableType::Gpt);
        assert_eq!(TableType::parse("sun"), TableType::Other);
        assert!(TableType::MsdosSectorBased.supports_extended());
        assert!(!TableType::Gpt.supports_extended());
    }

    #[test]
    fn msdos_bounds_follow_geometry() {
        let geometry = Geometry {
            heads: 16,
            sectors_per_track: 63,
            cylinders: 1000,
        };
        let bounds = TableInfo::msdos_bounds(&geometry);
        assert_eq!(bounds.first, 63);
        assert_eq!(bounds.last, 16 * 63 * 1000 - 1);
    }
}
