// SPDX-License-Identifier: GPL-3.0-only

//! Capability discovery from the tools installed on this machine

use layout_types::{CapabilityTable, FileSystemType, FsCapability, Support};

const EXT_TYPES: [(FileSystemType, &str); 3] = [
    (FileSystemType::Ext2, "mkfs.ext2"),
    (FileSystemType::Ext3, "mkfs.ext3"),
    (FileSystemType::Ext4, "mkfs.ext4"),
];

/// Types whose label and UUID blkid can read
const BLKID_READABLE: [FileSystemType; 11] = [
    FileSystemType::Ext2,
    FileSystemType::Ext3,
    FileSystemType::Ext4,
    FileSystemType::LinuxSwap,
    FileSystemType::Fat16,
    FileSystemType::Fat32,
    FileSystemType::Ntfs,
    FileSystemType::Btrfs,
    FileSystemType::Xfs,
    FileSystemType::Luks,
    FileSystemType::Lvm2Pv,
];

fn tool(present: bool) -> Support {
    if present { Support::Tool } else { Support::None }
}

fn core(present: bool) -> Support {
    if present { Support::Core } else { Support::None }
}

/// Build the capability table from `PATH`
pub fn probe_capabilities() -> CapabilityTable {
    let table = probe_with(|name| which::which(name).is_ok());
    tracing::debug!(types = table.known_types().count(), "probed filesystem tools");
    table
}

/// Build the capability table given a tool lookup
pub fn probe_with(has: impl Fn(&str) -> bool) -> CapabilityTable {
    let mut table = CapabilityTable::new();

    let blkid = has("blkid");
    for fs in BLKID_READABLE {
        if blkid {
            table.set(fs, FsCapability::GetLabel, Support::Core);
            table.set(fs, FsCapability::GetUuid, Support::Core);
        }
    }

    let check = has("e2fsck");
    let resize = check && has("resize2fs");
    let used = has("dumpe2fs");
    for (fs, mkfs) in EXT_TYPES {
        table.set(fs, FsCapability::Create, tool(has(mkfs)));
        table.set(fs, FsCapability::Check, tool(check));
        table.set(fs, FsCapability::Grow, tool(resize));
        table.set(fs, FsCapability::Shrink, tool(resize && used));
        table.set(fs, FsCapability::GetUsed, tool(used));
        table.set(fs, FsCapability::Move, core(check));
        table.set(fs, FsCapability::Copy, core(check));
        table.set(fs, FsCapability::Backup, Support::Core);
        table.set(fs, FsCapability::SetLabel, tool(has("e2label")));
        table.set(fs, FsCapability::UpdateUuid, tool(has("tune2fs")));
    }

    let swap = FileSystemType::LinuxSwap;
    let mkswap = has("mkswap");
    let swaplabel = has("swaplabel");
    table.set(swap, FsCapability::Create, tool(mkswap));
    table.set(swap, FsCapability::Grow, tool(mkswap && blkid));
    table.set(swap, FsCapability::Shrink, tool(mkswap && blkid));
    table.set(swap, FsCapability::Move, Support::Core);
    table.set(swap, FsCapability::Copy, Support::Core);
    table.set(swap, FsCapability::SetLabel, tool(swaplabel));
    table.set(swap, FsCapability::UpdateUuid, tool(swaplabel));

    let fat_check = has("fsck.fat");
    for fs in [FileSystemType::Fat16, FileSystemType::Fat32] {
        table.set(fs, FsCapability::Create, tool(has("mkfs.fat")));
        table.set(fs, FsCapability::Check, tool(fat_check));
        table.set(fs, FsCapability::SetLabel, tool(has("fatlabel")));
        table.set(fs, FsCapability::Move, core(fat_check));
        table.set(fs, FsCapability::Copy, core(fat_check));
    }

    // Containers move as opaque blocks
    table.set(FileSystemType::Luks, FsCapability::Move, Support::Core);
    table.set(FileSystemType::Luks, FsCapability::Copy, Support::Core);

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_e2fsprogs_enables_every_ext_capability() {
        let table = probe_with(|_| true);
        for cap in [
            FsCapability::Create,
            FsCapability::Grow,
            FsCapability::Shrink,
            FsCapability::Check,
            FsCapability::GetUsed,
            FsCapability::SetLabel,
            FsCapability::UpdateUuid,
        ] {
            assert_eq!(table.support(FileSystemType::Ext4, cap), Support::Tool, "{cap:?}");
        }
        assert_eq!(
            table.support(FileSystemType::Ext4, FsCapability::Move),
            Support::Core
        );
        assert!(table.supports(FileSystemType::Xfs, FsCapability::GetLabel));
        assert!(!table.supports(FileSystemType::Xfs, FsCapability::Create));
    }

    #[test]
    fn shrinking_needs_the_used_space_reader() {
        let table = probe_with(|name| name != "dumpe2fs");
        assert!(table.supports(FileSystemType::Ext3, FsCapability::Grow));
        assert!(!table.supports(FileSystemType::Ext3, FsCapability::Shrink));
        assert!(!table.supports(FileSystemType::Ext3, FsCapability::GetUsed));
    }

    #[test]
    fn missing_fsck_disables_moves_and_resizes() {
        let table = probe_with(|name| name != "e2fsck");
        assert!(table.supports(FileSystemType::Ext4, FsCapability::Create));
        assert!(!table.supports(FileSystemType::Ext4, FsCapability::Grow));
        assert!(!table.supports(FileSystemType::Ext4, FsCapability::Move));
        assert!(!table.supports(FileSystemType::Ext4, FsCapability::Copy));
    }

    #[test]
    fn nothing_installed() {
        let table = probe_with(|_| false);
        assert!(!table.supports(FileSystemType::Fat32, FsCapability::Create));
        assert!(!table.supports(FileSystemType::Ext4, FsCapability::GetLabel));
        assert!(table.supports(FileSystemType::LinuxSwap, FsCapability::Move));
    }
}
