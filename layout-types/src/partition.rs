//! Partition roles, flags and raw backend records

use enumflags2::{BitFlags, bitflags};
use serde::{Deserialize, Serialize};

use crate::SectorRange;

/// Role a partition plays in the tree. Roles combine (e.g. Logical + Luks).
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionRole {
    Primary = 1 << 0,
    Extended = 1 << 1,
    Logical = 1 << 2,
    Unallocated = 1 << 3,
    Luks = 1 << 4,
}

pub type PartitionRoles = BitFlags<PartitionRole>;

/// Short human-readable name for a role set
pub fn role_name(roles: PartitionRoles) -> &'static str {
    if roles.contains(PartitionRole::Unallocated) {
        "unallocated"
    } else if roles.contains(PartitionRole::Extended) {
        "extended"
    } else if roles.contains(PartitionRole::Logical) {
        "logical"
    } else if roles.contains(PartitionRole::Primary) {
        "primary"
    } else if roles.contains(PartitionRole::Luks) {
        "luks"
    } else {
        "none"
    }
}

/// Partition table flags a backend can report or set
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionFlag {
    Boot = 1 << 0,
    Root = 1 << 1,
    Swap = 1 << 2,
    Hidden = 1 << 3,
    Raid = 1 << 4,
    Lvm = 1 << 5,
    Lba = 1 << 6,
    HpService = 1 << 7,
    Palo = 1 << 8,
    Prep = 1 << 9,
    MsftReserved = 1 << 10,
    BiosGrub = 1 << 11,
    AppleTvRecovery = 1 << 12,
    Diag = 1 << 13,
    LegacyBoot = 1 << 14,
    MsftData = 1 << 15,
    Irst = 1 << 16,
    Esp = 1 << 17,
}

pub type PartitionFlags = BitFlags<PartitionFlag>;

impl PartitionFlag {
    /// Name as used by parted-style tooling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Root => "root",
            Self::Swap => "swap",
            Self::Hidden => "hidden",
            Self::Raid => "raid",
            Self::Lvm => "lvm",
            Self::Lba => "lba",
            Self::HpService => "hp-service",
            Self::Palo => "palo",
            Self::Prep => "prep",
            Self::MsftReserved => "msftres",
            Self::BiosGrub => "bios_grub",
            Self::AppleTvRecovery => "atvrecv",
            Self::Diag => "diag",
            Self::LegacyBoot => "legacy_boot",
            Self::MsftData => "msftdata",
            Self::Irst => "irst",
            Self::Esp => "esp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        BitFlags::<PartitionFlag>::all()
            .iter()
            .find(|flag| flag.as_str() == s)
    }
}

/// Flags a backend is known to mis-report for a given record kind.
///
/// The hidden flag is offered for extended partitions but cannot be set or
/// cleared on them.
pub fn misreported_flags(kind: RawPartitionKind) -> PartitionFlags {
    match kind {
        RawPartitionKind::Extended => PartitionFlag::Hidden.into(),
        _ => PartitionFlags::empty(),
    }
}

/// Kind of a raw partition record as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawPartitionKind {
    Normal,
    Extended,
    Logical,
    /// Free space, metadata or anything else the tree does not represent
    #[serde(other)]
    Other,
}

/// One partition entry exactly as the backend reported it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPartitionRecord {
    /// First sector (inclusive)
    pub start: u64,

    /// Last sector (inclusive)
    pub end: u64,

    pub kind: RawPartitionKind,

    /// Device node path (e.g., "/dev/sda5")
    pub path: String,

    /// Partition number (1-based)
    pub number: u32,

    #[serde(default)]
    pub available_flags: PartitionFlags,

    #[serde(default)]
    pub active_flags: PartitionFlags,
}

impl RawPartitionRecord {
    pub fn range(&self) -> SectorRange {
        SectorRange::new(self.start, self.end)
    }
}
