// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use super::{Operation, OperationCore};
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{Partition, PartitionId, PartitionNode, PartitionState, PartitionTable};

/// What happens to the data before the table entry goes away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShredAction {
    /// Only erase filesystem signatures
    #[default]
    None,
    Zero,
    Random,
}

/// Why `partition` cannot be deleted, if it cannot
pub fn check_delete(partition: &Partition) -> Result<(), ValidationError> {
    let refuse = |reason| ValidationError::CannotDelete {
        path: partition.display_path(),
        reason,
    };

    if partition.is_unallocated() {
        return Err(ValidationError::NotAPartition(partition.id));
    }
    if partition.is_mounted() {
        return Err(ValidationError::Mounted(partition.display_path()));
    }
    if partition.is_extended() && partition.real_children().next().is_some() {
        return Err(refuse("it still contains logical partitions"));
    }
    if partition.is_luks() {
        match &partition.file_system.crypto {
            None => return Err(refuse("its encryption state is unknown")),
            Some(crypto) if !crypto.unlocked => {
                return Err(refuse("it is a locked encrypted container"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

pub fn can_delete(partition: &Partition) -> bool {
    check_delete(partition).is_ok()
}

/// Removes a partition, optionally shredding its contents first. While
/// pending, the operation owns the removed partition.
pub struct DeleteOperation {
    core: OperationCore,
    target: PartitionId,
    description: String,
    deleted: Option<Partition>,
}

impl DeleteOperation {
    pub fn new(device: &Device, id: PartitionId, shred: ShredAction) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let partition = table.find(id).ok_or(ValidationError::NotFound(id))?;
        check_delete(partition)?;
        if partition.state != PartitionState::Existing {
            return Err(ValidationError::Uncommitted(id));
        }

        let mut jobs = Vec::new();
        if !partition.is_extended() {
            jobs.push(match shred {
                ShredAction::None => Job::DeleteFileSystem,
                ShredAction::Zero => Job::ShredFileSystem { random: false },
                ShredAction::Random => Job::ShredFileSystem { random: true },
            });
        }
        jobs.push(Job::DeletePartition);

        let verb = match shred {
            ShredAction::None => "Delete",
            ShredAction::Zero | ShredAction::Random => "Shred",
        };
        let description = format!(
            "{verb} partition {}",
            partition.describe(device.sector_size())
        );

        Ok(Self {
            core: OperationCore::new(jobs, Vec::new()),
            target: id,
            description,
            deleted: None,
        })
    }

    pub fn deleted(&self) -> Option<&Partition> {
        self.deleted.as_ref()
    }
}

impl Operation for DeleteOperation {
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

    fn preview_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = table
            .detach(self.target)
            .ok_or(ValidationError::NotFound(self.target))?;
        if let Some(number) = partition.number.filter(|_| partition.is_logical()) {
            table.adjust_logical_numbers(number + 1, -1);
        }
        self.deleted = Some(partition);
        Ok(())
    }

    fn undo_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = self
            .deleted
            .take()
            .ok_or(ValidationError::NotFound(self.target))?;
        if let Some(number) = partition.number.filter(|_| partition.is_logical()) {
            table.adjust_logical_numbers(number, 1);
        }
        table.attach(partition);
        Ok(())
    }

    fn target_mut<'a>(&'a mut self, _table: &'a mut PartitionTable) -> Option<&'a mut Partition> {
        self.deleted.as_mut()
    }
}
