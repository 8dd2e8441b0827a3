// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{
    FileSystemType, PartitionFlags, PartitionRole, PartitionRoles, SectorRange, bytes_to_pretty,
    role_name,
};
use serde::{Deserialize, Serialize};

use super::{FileSystem, NodeRef, PartitionId, PartitionNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountState {
    pub mounted: bool,
    pub mount_point: Option<String>,
}

/// Where a partition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Read from the device
    Existing,
    /// Staged by a create operation
    New,
    /// Staged by a copy operation
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub parent: NodeRef,
    pub roles: PartitionRoles,
    pub first_sector: u64,
    pub last_sector: u64,

    /// Device node, known once the partition exists on disk
    pub path: Option<String>,

    /// Partition number, known once the partition exists on disk
    pub number: Option<u32>,

    pub file_system: FileSystem,
    pub active_flags: PartitionFlags,
    pub available_flags: PartitionFlags,
    pub mount: MountState,
    pub state: PartitionState,

    /// Set by the alignment checker
    pub misaligned: bool,

    children: Vec<Partition>,
}

impl Partition {
    pub fn new(
        id: PartitionId,
        parent: NodeRef,
        roles: PartitionRoles,
        range: SectorRange,
        file_system: FileSystem,
        state: PartitionState,
    ) -> Self {
        Self {
            id,
            parent,
            roles,
            first_sector: range.first,
            last_sector: range.last,
            path: None,
            number: None,
            file_system,
            active_flags: PartitionFlags::empty(),
            available_flags: PartitionFlags::empty(),
            mount: MountState::default(),
            state,
            misaligned: false,
            children: Vec::new(),
        }
    }

    /// Free space placeholder. Inside an extended partition it also carries
    /// the logical role.
    pub fn unallocated(id: PartitionId, parent: NodeRef, range: SectorRange) -> Self {
        let roles = match parent {
            NodeRef::Table => PartitionRoles::from(PartitionRole::Unallocated),
            NodeRef::Partition(_) => PartitionRole::Unallocated | PartitionRole::Logical,
        };
        Self::new(
            id,
            parent,
            roles,
            range,
            FileSystem::new(FileSystemType::Unknown),
            PartitionState::Existing,
        )
    }

    pub fn range(&self) -> SectorRange {
        SectorRange::new(self.first_sector, self.last_sector)
    }

    pub fn length(&self) -> u64 {
        self.range().length()
    }

    pub fn set_range(&mut self, range: SectorRange) {
        self.first_sector = range.first;
        self.last_sector = range.last;
    }

    pub fn is_unallocated(&self) -> bool {
        self.roles.contains(PartitionRole::Unallocated)
    }

    pub fn is_extended(&self) -> bool {
        self.roles.contains(PartitionRole::Extended)
    }

    pub fn is_logical(&self) -> bool {
        self.roles.contains(PartitionRole::Logical) && !self.is_unallocated()
    }

    pub fn is_luks(&self) -> bool {
        self.roles.contains(PartitionRole::Luks)
    }

    /// For an open encrypted container this reflects the mapped device
    pub fn is_mounted(&self) -> bool {
        self.mount.mounted
    }

    /// Node path for reports, falling back to a placeholder for staged partitions
    pub fn display_path(&self) -> String {
        match &self.path {
            Some(path) => path.clone(),
            None => format!("new {} partition", role_name(self.roles)),
        }
    }

    /// Short human description, e.g. "/dev/sda5 (1.00 GB, ext4)"
    pub fn describe(&self, sector_size: u64) -> String {
        format!(
            "{} ({}, {})",
            self.display_path(),
            bytes_to_pretty(&self.range().bytes(sector_size), false),
            self.file_system.effective().fs_type.name()
        )
    }
}

impl PartitionNode for Partition {
    fn children(&self) -> &[Partition] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Partition> {
        &mut self.children
    }
}
