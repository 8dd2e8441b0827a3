//! Filesystem types and the per-type capability table
//!
//! Filesystems are opaque to the core beyond a handful of capabilities. Which
//! of those capabilities work on this machine is decided once (usually by a
//! tool prober) and handed around as a `CapabilityTable` value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Filesystem types the core distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemType {
    Unknown,
    /// Placeholder carried by extended partitions
    Extended,
    /// No filesystem at all (freshly created partition)
    Unformatted,
    Ext2,
    Ext3,
    Ext4,
    LinuxSwap,
    Fat16,
    Fat32,
    Ntfs,
    Btrfs,
    Xfs,
    Luks,
    Lvm2Pv,
}

impl FileSystemType {
    /// Parse from a blkid-style TYPE string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ext2" => Self::Ext2,
            "ext3" => Self::Ext3,
            "ext4" => Self::Ext4,
            "swap" | "linux-swap" | "linuxswap" => Self::LinuxSwap,
            "fat16" | "msdos" => Self::Fat16,
            "vfat" | "fat32" => Self::Fat32,
            "ntfs" => Self::Ntfs,
            "btrfs" => Self::Btrfs,
            "xfs" => Self::Xfs,
            "crypto_luks" | "luks" => Self::Luks,
            "lvm2_member" | "lvm2pv" => Self::Lvm2Pv,
            "extended" => Self::Extended,
            "unformatted" => Self::Unformatted,
            _ => Self::Unknown,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Extended => "extended",
            Self::Unformatted => "unformatted",
            Self::Ext2 => "ext2",
            Self::Ext3 => "ext3",
            Self::Ext4 => "ext4",
            Self::LinuxSwap => "linuxswap",
            Self::Fat16 => "fat16",
            Self::Fat32 => "fat32",
            Self::Ntfs => "ntfs",
            Self::Btrfs => "btrfs",
            Self::Xfs => "xfs",
            Self::Luks => "luks",
            Self::Lvm2Pv => "lvm2 pv",
        }
    }

    /// Whether a partition with this type wraps another volume
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Luks)
    }
}

/// Things a filesystem may be able to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsCapability {
    GetUsed,
    GetLabel,
    SetLabel,
    Create,
    Grow,
    Shrink,
    Move,
    Check,
    Copy,
    Backup,
    UpdateUuid,
    GetUuid,
}

/// How a capability is provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    #[default]
    None,
    /// Provided by generic block-level code (copy, move, signature reads)
    Core,
    /// Provided by a filesystem-specific external tool
    Tool,
}

impl Support {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Per filesystem type mapping from capability to support level.
///
/// Anything not listed is unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityTable {
    entries: BTreeMap<FileSystemType, BTreeMap<FsCapability, Support>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, fs: FileSystemType, capability: FsCapability, support: Support) {
        let caps = self.entries.entry(fs).or_default();
        if support.is_supported() {
            caps.insert(capability, support);
        } else {
            caps.remove(&capability);
        }
    }

    /// Builder-style variant of `set`
    pub fn with(mut self, fs: FileSystemType, capability: FsCapability, support: Support) -> Self {
        self.set(fs, capability, support);
        self
    }

    pub fn support(&self, fs: FileSystemType, capability: FsCapability) -> Support {
        self.entries
            .get(&fs)
            .and_then(|caps| caps.get(&capability))
            .copied()
            .unwrap_or_default()
    }

    pub fn supports(&self, fs: FileSystemType, capability: FsCapability) -> bool {
        self.support(fs, capability).is_supported()
    }

    /// Filesystem types with at least one supported capability
    pub fn known_types(&self) -> impl Iterator<Item = FileSystemType> + '_ {
        self.entries
            .iter()
            .filter(|(_, caps)| !caps.is_empty())
            .map(|(fs, _)| *fs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blkid_type_names() {
        assert_eq!(FileSystemType::parse("crypto_LUKS"), FileSystemType::Luks);
        assert_eq!(FileSystemType::parse("vfat"), FileSystemType::Fat32);
        assert_eq!(FileSystemType::parse("swap"), FileSystemType::LinuxSwap);
        assert_eq!(FileSystemType::parse("zfs_member"), FileSystemType::Unknown);
    }

    #[test]
    fn unlisted_capabilities_are_unsupported() {
        let table = CapabilityTable::new()
            .with(FileSystemType::Ext4, FsCapability::Check, Support::Tool)
            .with(FileSystemType::Ext4, FsCapability::Move, Support::Core);

        assert!(table.supports(FileSystemType::Ext4, FsCapability::Check));
        assert_eq!(
            table.support(FileSystemType::Ext4, FsCapability::Move),
            Support::Core
        );
        assert!(!table.supports(FileSystemType::Ext4, FsCapability::Shrink));
        assert!(!table.supports(FileSystemType::Xfs, FsCapability::Check));
    }

    #[test]
    fn setting_none_removes_capability() {
        let mut table =
            CapabilityTable::new().with(FileSystemType::Ext2, FsCapability::Grow, Support::Tool);
        table.set(FileSystemType::Ext2, FsCapability::Grow, Support::None);
        assert!(!table.supports(FileSystemType::Ext2, FsCapability::Grow));
        assert_eq!(table.known_types().count(), 0);
    }
}
