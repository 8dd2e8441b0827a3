// SPDX-License-Identifier: GPL-3.0-only

use layout_types::FsCapability;

use super::{Operation, OperationCore, require};
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{Partition, PartitionId, PartitionTable};

/// Checks and repairs a filesystem; the tree is left as it is
pub struct CheckOperation {
    core: OperationCore,
    target: PartitionId,
    description: String,
}

impl CheckOperation {
    pub fn new(device: &Device, config: &CoreConfig, id: PartitionId) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let partition = table.find(id).ok_or(ValidationError::NotFound(id))?;
        if partition.is_unallocated() || partition.is_extended() {
            return Err(ValidationError::NotAPartition(id));
        }
        if partition.is_mounted() {
            return Err(ValidationError::Mounted(partition.display_path()));
        }
        require(
            &config.capabilities,
            partition.file_system.effective().fs_type,
            FsCapability::Check,
        )?;

        Ok(Self {
            core: OperationCore::new(vec![Job::CheckFileSystem], Vec::new()),
            target: id,
            description: format!(
                "Check and repair partition {}",
                partition.describe(device.sector_size())
            ),
        })
    }
}

impl Operation for CheckOperation {
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

    fn preview_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        table
            .find(self.target)
            .map(|_| ())
            .ok_or(ValidationError::NotFound(self.target))
    }

    fn undo_tree(&mut self, _table: &mut PartitionTable) -> Result<(), ValidationError> {
        Ok(())
    }

    fn target_mut<'a>(&'a mut self, table: &'a mut PartitionTable) -> Option<&'a mut Partition> {
        table.find_mut(self.target)
    }
}

#[cfg(test)]
mod tests {
    use layout_types::PartitionRole;

    use super::*;
    use crate::fake::extended_layout;
    use crate::operation::test_support::{full_ext4_config, scanned, shape};

    #[test]
    fn check_leaves_the_tree_alone() {
        let config = full_ext4_config();
        let mut device = scanned(&extended_layout(), &config);
        let id = device
            .table()
            .expect("table")
            .find_by_sector(2048, PartitionRole::Primary.into())
            .expect("sda1")
            .id;

        let mut op = CheckOperation::new(&device, &config, id).expect("valid check");
        assert_eq!(op.jobs(), &[Job::CheckFileSystem]);

        let table = device.table_mut().expect("table");
        let before = shape(table);
        op.preview(table).expect("preview");
        assert_eq!(shape(table), before);
        op.undo(table).expect("undo");
        assert_eq!(shape(table), before);
    }

    #[test]
    fn free_space_and_mounted_partitions_cannot_be_checked() {
        let config = full_ext4_config();
        let fake = extended_layout();
        fake.mount("/dev/sda1", "/", 4096);
        let device = scanned(&fake, &config);
        let table = device.table().expect("table");

        let sda1 = table
            .find_by_sector(2048, PartitionRole::Primary.into())
            .expect("sda1")
            .id;
        assert_eq!(
            CheckOperation::new(&device, &config, sda1).err(),
            Some(ValidationError::Mounted("/dev/sda1".to_string()))
        );

        let free = table
            .find_by_sector(400_000, PartitionRole::Unallocated.into())
            .expect("free space inside the extended partition")
            .id;
        assert_eq!(
            CheckOperation::new(&device, &config, free).err(),
            Some(ValidationError::NotAPartition(free))
        );
    }
}
