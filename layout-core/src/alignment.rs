// SPDX-License-Identifier: GPL-3.0-only

//! Partition alignment policy
//!
//! Cylinder-based MS-DOS tables align to the cylinder size, measured from
//! the end of the first track. Everything else aligns to the device's
//! reported granularity, or to the configured fallback when it reports none.
//! The usable bounds reported by the backend are always valid boundaries.

use layout_types::{DeviceInfo, PartitionRole, PartitionRoles, SectorRange, TableType};

use crate::config::AlignmentConfig;
use crate::tree::{Partition, PartitionTable};

/// Sector alignment for non-cylinder layouts
pub fn sector_alignment(device: &DeviceInfo, config: &AlignmentConfig) -> u64 {
    device
        .alignment_sectors
        .filter(|sectors| *sectors > 0)
        .unwrap_or_else(|| config.fallback_sectors(device.logical_sector_size))
}

fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

fn align_down(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value / alignment * alignment
}

/// Alignment rules for one table on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    unit: u64,
    track_offset: u64,
    bounds: SectorRange,
}

impl Alignment {
    pub fn new(device: &DeviceInfo, table: &PartitionTable, config: &AlignmentConfig) -> Self {
        let cylinder = device.geometry.cylinder_size();
        let (unit, track_offset) = if table.table_type == TableType::Msdos && cylinder > 0 {
            (cylinder, u64::from(device.geometry.sectors_per_track))
        } else {
            (sector_alignment(device, config).max(1), 0)
        };
        Self {
            unit,
            track_offset,
            bounds: table.usable(),
        }
    }

    pub fn unit(&self) -> u64 {
        self.unit
    }

    /// Distance of `first` past the previous boundary
    fn first_delta(&self, roles: PartitionRoles, first: u64) -> u64 {
        if self.track_offset > 0 {
            let offset = self.track_offset;
            if roles.contains(PartitionRole::Logical) && first == 2 * offset {
                return 0;
            }
            if (roles.contains(PartitionRole::Logical) || first == offset) && first >= offset {
                return (first - offset) % self.unit;
            }
        }
        first % self.unit
    }

    pub fn is_range_aligned(&self, roles: PartitionRoles, range: SectorRange) -> bool {
        let first_ok = range.first == self.bounds.first || self.first_delta(roles, range.first) == 0;
        let last_ok = range.last == self.bounds.last
            || range.last.saturating_add(1) % self.unit == 0;
        first_ok && last_ok
    }

    pub fn is_aligned(&self, partition: &Partition) -> bool {
        self.is_range_aligned(partition.roles, partition.range())
    }

    /// Closest aligned range to `range` inside `limits`: the start moves up to
    /// the next boundary, the length is kept, and the end moves down to a
    /// boundary so that at most one unit is lost.
    pub fn relocated_and_resized(&self, range: SectorRange, limits: SectorRange) -> SectorRange {
        let length = range.length().max(1);

        let first = if range.first <= limits.first {
            limits.first
        } else {
            let first =
                align_up(range.first.saturating_sub(self.track_offset), self.unit) + self.track_offset;
            first.min(limits.last)
        };

        let mut last = first.saturating_add(length - 1);
        if last >= limits.last {
            last = limits.last;
        } else {
            let end = align_down(last.saturating_add(1), self.unit);
            if end > first {
                last = end - 1;
            }
        }

        SectorRange::new(first, last)
    }
}

#[cfg(test)]
mod tests {
    use layout_types::{Geometry, TableInfo};

    use super::*;

    fn device(alignment_sectors: Option<u64>) -> DeviceInfo {
        DeviceInfo {
            path: "/dev/sda".to_string(),
            model: String::new(),
            geometry: Geometry {
                heads: 255,
                sectors_per_track: 63,
                cylinders: 1000,
            },
            logical_sector_size: 512,
            total_sectors: 255 * 63 * 1000,
            alignment_sectors,
        }
    }

    fn table(table_type: TableType, first: u64, last: u64) -> PartitionTable {
        PartitionTable::new(TableInfo {
            table_type,
            first_usable: first,
            last_usable: last,
            max_primaries: 4,
        })
    }

    #[test]
    fn falls_back_to_configured_alignment() {
        let config = AlignmentConfig::default();
        assert_eq!(sector_alignment(&device(None), &config), 2048);
        assert_eq!(sector_alignment(&device(Some(8)), &config), 8);
        assert_eq!(sector_alignment(&device(Some(0)), &config), 2048);
    }

    #[test]
    fn gpt_first_usable_is_accepted_verbatim() {
        let config = AlignmentConfig::default();
        let table = table(TableType::Gpt, 34, 1_000_000);
        let alignment = Alignment::new(&device(None), &table, &config);
        let primary = PartitionRoles::from(PartitionRole::Primary);

        assert!(alignment.is_range_aligned(primary, SectorRange::new(34, 4095)));
        assert!(alignment.is_range_aligned(primary, SectorRange::new(4096, 1_000_000)));
        assert!(alignment.is_range_aligned(primary, SectorRange::new(2048, 6143)));
        assert!(!alignment.is_range_aligned(primary, SectorRange::new(2049, 6143)));
        assert!(!alignment.is_range_aligned(primary, SectorRange::new(2048, 6000)));
    }

    #[test]
    fn cylinder_tables_measure_from_first_track() {
        let config = AlignmentConfig::default();
        let table = table(TableType::Msdos, 63, 255 * 63 * 1000 - 1);
        let alignment = Alignment::new(&device(None), &table, &config);
        let cylinder = 255 * 63;
        assert_eq!(alignment.unit(), cylinder);

        let primary = PartitionRoles::from(PartitionRole::Primary);
        let logical = PartitionRoles::from(PartitionRole::Logical);
        assert!(alignment.is_range_aligned(primary, SectorRange::new(63, cylinder - 1)));
        assert!(alignment.is_range_aligned(primary, SectorRange::new(cylinder, 2 * cylinder - 1)));
        assert!(alignment.is_range_aligned(logical, SectorRange::new(cylinder + 63, 2 * cylinder - 1)));
        assert!(alignment.is_range_aligned(logical, SectorRange::new(126, cylinder - 1)));
    }

    #[test]
    fn relocation_keeps_length_and_loses_at_most_one_unit() {
        let config = AlignmentConfig::default();
        let table = table(TableType::Gpt, 34, 1_000_000);
        let alignment = Alignment::new(&device(None), &table, &config);

        let proposed =
            alignment.relocated_and_resized(SectorRange::new(3000, 13_000), table.usable());
        assert_eq!(proposed.first, 4096);
        assert_eq!((proposed.last + 1) % 2048, 0);
        assert!(proposed.length() <= 10_001);
        assert!(10_001 - proposed.length() < 2048);
        assert!(alignment.is_range_aligned(PartitionRole::Primary.into(), proposed));

        let at_start = alignment.relocated_and_resized(SectorRange::new(0, 4095), table.usable());
        assert_eq!(at_start.first, 34);

        let at_end =
            alignment.relocated_and_resized(SectorRange::new(990_000, 1_200_000), table.usable());
        assert_eq!(at_end.last, 1_000_000);
    }
}
