// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{FileSystemType, FsCapability, SectorRange};

use super::{Operation, OperationCore, alignment_warning, require};
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{Partition, PartitionId, PartitionNode, PartitionState, PartitionTable};

/// Gives an existing partition a new sector range, moving and resizing its
/// filesystem as needed
pub struct ResizeOperation {
    core: OperationCore,
    target: PartitionId,
    original: SectorRange,
    requested: SectorRange,
    description: String,
}

impl ResizeOperation {
    pub fn new(
        device: &Device,
        config: &CoreConfig,
        id: PartitionId,
        requested: SectorRange,
    ) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let partition = table.find(id).ok_or(ValidationError::NotFound(id))?;
        if partition.is_unallocated() {
            return Err(ValidationError::NotAPartition(id));
        }
        if partition.state != PartitionState::Existing {
            return Err(ValidationError::Uncommitted(id));
        }
        if partition.is_mounted() {
            return Err(ValidationError::Mounted(partition.display_path()));
        }

        let original = partition.range();
        if requested == original {
            return Err(ValidationError::NothingToDo);
        }
        table.check_insertion(partition.roles, requested, Some(id))?;

        let jobs = if partition.is_extended() {
            if partition
                .real_children()
                .any(|child| !requested.contains_range(&child.range()))
            {
                return Err(ValidationError::ChildrenOutside(id));
            }
            vec![Job::SetPartitionGeometry { range: requested }]
        } else {
            plan_jobs(config, partition, original, requested)?
        };

        let warnings = alignment_warning(
            &device.info,
            table,
            &config.alignment,
            partition.roles,
            requested,
        )
        .into_iter()
        .collect();

        let description = format!(
            "Resize/move partition {} from sectors {}..={} to {}..={}",
            partition.display_path(),
            original.first,
            original.last,
            requested.first,
            requested.last
        );

        Ok(Self {
            core: OperationCore::new(jobs, warnings),
            target: id,
            original,
            requested,
            description,
        })
    }
}

/// Shrink before the table entry changes, grow after it; move in between
fn plan_jobs(
    config: &CoreConfig,
    partition: &Partition,
    original: SectorRange,
    requested: SectorRange,
) -> Result<Vec<Job>, ValidationError> {
    let fs = partition.file_system.effective();
    let old_length = original.length();
    let new_length = requested.length();
    let shrink = new_length < old_length;
    let grow = new_length > old_length;
    let moved = requested.first != original.first;

    if fs.fs_type == FileSystemType::Unformatted {
        return Ok(vec![Job::SetPartitionGeometry { range: requested }]);
    }

    let capabilities = &config.capabilities;
    if shrink {
        require(capabilities, fs.fs_type, FsCapability::Shrink)?;
        if let Some(used) = fs.sectors_used.filter(|used| new_length < *used) {
            return Err(ValidationError::TooSmall {
                requested: new_length,
                used,
            });
        }
    }
    if grow {
        require(capabilities, fs.fs_type, FsCapability::Grow)?;
    }
    if moved {
        require(capabilities, fs.fs_type, FsCapability::Move)?;
    }

    let check = capabilities.supports(fs.fs_type, FsCapability::Check);
    let mut jobs = Vec::new();
    if check {
        jobs.push(Job::CheckFileSystem);
    }
    if shrink {
        jobs.push(Job::ResizeFileSystem { length: new_length });
    }
    jobs.push(Job::SetPartitionGeometry { range: requested });
    if moved {
        jobs.push(Job::MoveFileSystem {
            from_first: original.first,
            length: old_length.min(new_length),
        });
    }
    if grow {
        jobs.push(Job::ResizeFileSystem { length: new_length });
    }
    if check {
        jobs.push(Job::CheckFileSystem);
    }
    Ok(jobs)
}

impl Operation for ResizeOperation {
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
        vec![self.target]
    }

    fn claims(&self) -> Vec<PartitionId> {
        vec![self.target]
    }

    /// Checks the requested range against the tree as staged now
    fn preview_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = table
            .find(self.target)
            .ok_or(ValidationError::NotFound(self.target))?;
        table.check_insertion(partition.roles, self.requested, Some(self.target))?;
        if partition.is_extended()
            && partition
                .real_children()
                .any(|child| !self.requested.contains_range(&child.range()))
        {
            return Err(ValidationError::ChildrenOutside(self.target));
        }
        let current = partition.range();

        if let Some(partition) = table.find_mut(self.target) {
            self.original = current;
            partition.set_range(self.requested);
        }
        table.update_unallocated();
        Ok(())
    }

    fn undo_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = table
            .find_mut(self.target)
            .ok_or(ValidationError::NotFound(self.target))?;
        partition.set_range(self.original);
        table.update_unallocated();
        Ok(())
    }

    fn target_mut<'a>(&'a mut self, table: &'a mut PartitionTable) -> Option<&'a mut Partition> {
        table.find_mut(self.target)
    }
}
