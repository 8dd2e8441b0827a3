// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{
    FileSystemType, FsCapability, PartitionRole, PartitionRoles, SectorRange, bytes_to_pretty,
};

use super::{Operation, OperationCore, alignment_warning, require};
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{FileSystem, NodeRef, Partition, PartitionId, PartitionState, PartitionTable};

/// Creates a partition in free space, optionally formatting and labelling it
pub struct CreateOperation {
    core: OperationCore,
    roles: PartitionRoles,
    range: SectorRange,
    file_system: FileSystem,
    description: String,
    id: Option<PartitionId>,
    staged: Option<Partition>,
}

impl CreateOperation {
    pub fn new(
        device: &Device,
        config: &CoreConfig,
        role: PartitionRole,
        range: SectorRange,
        fs_type: FileSystemType,
        label: Option<String>,
    ) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let roles = PartitionRoles::from(role);
        table.check_insertion(roles, range, None)?;

        let fs_type = if role == PartitionRole::Extended {
            FileSystemType::Extended
        } else {
            fs_type
        };
        let formats = !matches!(
            fs_type,
            FileSystemType::Extended | FileSystemType::Unformatted
        );

        let mut jobs = vec![Job::CreatePartition];
        if formats {
            require(&config.capabilities, fs_type, FsCapability::Create)?;
            jobs.push(Job::CreateFileSystem);
        }
        if let Some(label) = &label {
            require(&config.capabilities, fs_type, FsCapability::SetLabel)?;
            jobs.push(Job::SetFileSystemLabel {
                label: label.clone(),
            });
        }

        let warnings = alignment_warning(&device.info, table, &config.alignment, roles, range)
            .into_iter()
            .collect();

        let mut file_system = FileSystem::new(fs_type);
        file_system.label = label;

        let description = format!(
            "Create a new {} partition ({}, {}) on {}",
            layout_types::role_name(roles),
            bytes_to_pretty(&range.bytes(device.sector_size()), false),
            fs_type.name(),
            device.path()
        );

        Ok(Self {
            core: OperationCore::new(jobs, warnings),
            roles,
            range,
            file_system,
            description,
            id: None,
            staged: None,
        })
    }

    /// Identifier of the new partition once previewed
    pub fn partition_id(&self) -> Option<PartitionId> {
        self.id
    }
}

impl Operation for CreateOperation {
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
        self.id.into_iter().collect()
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
                    PartitionState::New,
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
