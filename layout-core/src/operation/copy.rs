// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{FsCapability, PartitionRole, PartitionRoles, SectorRange};

use super::{Operation, OperationCore, alignment_warning, require};
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{
    CryptoState, FileSystem, NodeRef, Partition, PartitionId, PartitionState, PartitionTable,
};

/// Duplicates a partition into free space on the same device
pub struct CopyOperation {
    core: OperationCore,
    source: PartitionId,
    roles: PartitionRoles,
    range: SectorRange,
    file_system: FileSystem,
    description: String,
    id: Option<PartitionId>,
    staged: Option<Partition>,
}

impl CopyOperation {
    /// Copy `source` to a new partition starting at `first` with the same length
    pub fn new(
        device: &Device,
        config: &CoreConfig,
        source: PartitionId,
        first: u64,
        role: PartitionRole,
    ) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let partition = table.find(source).ok_or(ValidationError::NotFound(source))?;
        if partition.is_unallocated() || partition.is_extended() {
            return Err(ValidationError::NotAPartition(source));
        }
        if partition.state != PartitionState::Existing {
            return Err(ValidationError::Uncommitted(source));
        }
        if partition.is_mounted() {
            return Err(ValidationError::Mounted(partition.display_path()));
        }
        let source_path = partition
            .path
            .clone()
            .ok_or(ValidationError::Uncommitted(source))?;

        let fs_type = partition.file_system.fs_type;
        require(&config.capabilities, fs_type, FsCapability::Copy)?;

        let length = partition.length();
        let range = SectorRange::new(first, first.saturating_add(length).saturating_sub(1));
        let mut roles = PartitionRoles::from(role);
        if partition.is_luks() {
            roles |= PartitionRole::Luks;
        }
        table.check_insertion(roles, range, None)?;

        let update_uuid = config.capabilities.supports(fs_type, FsCapability::UpdateUuid);
        let mut file_system = partition.file_system.clone();
        if file_system.crypto.is_some() {
            file_system.crypto = Some(CryptoState::locked());
        }
        if update_uuid {
            file_system.uuid = None;
        }

        let mut jobs = vec![
            Job::CreatePartition,
            Job::CopyFileSystem {
                source_path: source_path.clone(),
                length,
            },
        ];
        if update_uuid {
            jobs.push(Job::UpdateUuid);
        }

        let warnings = alignment_warning(&device.info, table, &config.alignment, roles, range)
            .into_iter()
            .collect();

        let description = format!(
            "Copy {} to {} at sector {first}",
            partition.describe(device.sector_size()),
            device.path()
        );

        Ok(Self {
            core: OperationCore::new(jobs, warnings),
            source,
            roles,
            range,
            file_system,
            description,
            id: None,
            staged: None,
        })
    }

    /// Identifier of the copy once previewed
    pub fn partition_id(&self) -> Option<PartitionId> {
        self.id
    }
}

impl Operation for CopyOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut OperationCore {
        &mut self.core
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn targets(&self) -> Vec<PartitionId> {
        std::iter::once(self.source).chain(self.id).collect()
    }

    /// The source must stay untouched until the copy has run
    fn claims(&self) -> Vec<PartitionId> {
        vec![self.source]
    }

    fn preview_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = match self.staged.take() {
            Some(partition) => partition,
            None => {
                let id = match self.id {
                    Some(id) => id,
                    None => table.allocate_id(),
                };
                Partition::new(
                    id,
                    NodeRef::Table,
                    self.roles,
                    self.range,
                    self.file_system.clone(),
                    PartitionState::Copy,
                )
            }
        };
        self.id = Some(partition.id);
        table.insert(partition)?;
        Ok(())
    }

    fn undo_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let id = self.id.ok_or(ValidationError::NothingToDo)?;
        self.staged = Some(table.detach(id).ok_or(ValidationError::NotFound(id))?);
        Ok(())
    }

    fn target_mut<'a>(&'a mut self, table: &'a mut PartitionTable) -> Option<&'a mut Partition> {
        table.find_mut(self.id?)
    }
}

#[cfg(test)]
mod tests {
    use layout_types::FileSystemType;

    use super::*;
    use crate::fake::extended_layout;
    use crate::operation::test_support::{full_ext4_config, scanned, shape};

    fn sda5(device: &Device) -> PartitionId {
        device
            .table()
            .expect("table")
            .find_by_sector(150_000, PartitionRole::Logical.into())
            .expect("sda5")
            .id
    }

    #[test]
    fn copy_creates_then_copies_then_refreshes_the_uuid() {
        let config = full_ext4_config();
        let fake = extended_layout();
        fake.set_uuid("/dev/sda5", "1111-2222");
        let mut device = scanned(&fake, &config);
        let source = sda5(&device);

        let mut op = CopyOperation::new(&device, &config, source, 300_001, PartitionRole::Logical)
            .expect("valid copy");
        assert_eq!(
            op.jobs(),
            &[
                Job::CreatePartition,
                Job::CopyFileSystem {
                    source_path: "/dev/sda5".to_string(),
                    length: 100_001
                },
                Job::UpdateUuid,
            ]
        );
        assert_eq!(op.claims(), vec![source]);

        let before = shape(device.table().expect("table"));
        let table = device.table_mut().expect("table");
        op.preview(table).expect("preview");
        let id = op.partition_id().expect("copy id");
        let copy = table.find(id).expect("copy in tree");
        assert_eq!(copy.range(), SectorRange::new(300_001, 400_001));
        assert_eq!(copy.state, PartitionState::Copy);
        assert_eq!(copy.file_system.fs_type, FileSystemType::Ext4);
        assert_eq!(copy.file_system.uuid, None);
        assert_eq!(op.targets(), vec![source, id]);

        op.undo(table).expect("undo");
        assert_eq!(shape(table), before);
    }

    #[test]
    fn copy_needs_room_and_an_unmounted_source() {
        let config = full_ext4_config();
        let fake = extended_layout();
        let device = scanned(&fake, &config);
        let source = sda5(&device);

        let err = CopyOperation::new(&device, &config, source, 450_000, PartitionRole::Logical)
            .err();
        assert_eq!(err, Some(ValidationError::LogicalOutsideExtended));

        fake.mount("/dev/sda5", "/home", 0);
        let device = scanned(&fake, &config);
        let source = sda5(&device);
        let err = CopyOperation::new(&device, &config, source, 300_001, PartitionRole::Logical)
            .err();
        assert_eq!(err, Some(ValidationError::Mounted("/dev/sda5".to_string())));
    }
}
