//! Common utility types shared across models

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

/// Default alignment boundary (1 MiB) used when a device reports no granularity
pub const DEFAULT_ALIGNMENT_BYTES: u64 = 1024 * 1024;

/// An inclusive sector range. Sectors are the sole unit of position and length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorRange {
    /// First sector (inclusive)
    pub first: u64,

    /// Last sector (inclusive)
    pub last: u64,
}

impl SectorRange {
    pub fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// Number of sectors covered; zero for an inverted range
    pub fn length(&self) -> u64 {
        if self.last < self.first {
            0
        } else {
            self.last - self.first + 1
        }
    }

    pub fn contains(&self, sector: u64) -> bool {
        self.first <= sector && sector <= self.last
    }

    pub fn contains_range(&self, other: &SectorRange) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    pub fn overlaps(&self, other: &SectorRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    /// Size of this range in bytes for the given logical sector size
    pub fn bytes(&self, sector_size: u64) -> u64 {
        self.length().saturating_mul(sector_size)
    }
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps <= 8 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        6 => "EB",
        7 => "ZB",
        8 => "YB",
        _ => "Not Supported",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_range_is_inclusive() {
        let range = SectorRange::new(2048, 4095);
        assert_eq!(range.length(), 2048);
        assert!(range.contains(2048));
        assert!(range.contains(4095));
        assert!(!range.contains(4096));
        assert_eq!(range.bytes(512), 1024 * 1024);
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let a = SectorRange::new(100, 199);
        let b = SectorRange::new(200, 299);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&SectorRange::new(199, 250)));
        assert!(SectorRange::new(0, 1000).contains_range(&b));
    }

    #[test]
    fn pretty_bytes_uses_binary_steps() {
        assert_eq!(bytes_to_pretty(&512, false), "512.00 B");
        assert_eq!(bytes_to_pretty(&(3 * 1024 * 1024), false), "3.00 MB");
        assert_eq!(
            bytes_to_pretty(&(1536 * 1024), true),
            "1.50 MB (1,572,864 bytes)"
        );
    }
}
