// SPDX-License-Identifier: GPL-3.0-only

use layout_types::FsCapability;

use super::{Operation, OperationCore, require};
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::ValidationError;
use crate::job::Job;
use crate::tree::{Partition, PartitionId, PartitionTable};

/// Writes a new filesystem label. An empty label clears it.
pub struct SetLabelOperation {
    core: OperationCore,
    target: PartitionId,
    old_label: Option<String>,
    new_label: Option<String>,
    description: String,
}

impl SetLabelOperation {
    pub fn new(
        device: &Device,
        config: &CoreConfig,
        id: PartitionId,
        label: &str,
    ) -> Result<Self, ValidationError> {
        let table = device.table()?;
        let partition = table.find(id).ok_or(ValidationError::NotFound(id))?;
        if partition.is_unallocated() || partition.is_extended() {
            return Err(ValidationError::NotAPartition(id));
        }

        let fs = partition.file_system.effective();
        require(&config.capabilities, fs.fs_type, FsCapability::SetLabel)?;

        let new_label = Some(label.to_string()).filter(|label| !label.is_empty());
        if new_label == fs.label {
            return Err(ValidationError::NothingToDo);
        }

        let description = format!(
            "Set label for partition {} to \"{label}\"",
            partition.display_path()
        );

        Ok(Self {
            core: OperationCore::new(
                vec![Job::SetFileSystemLabel {
                    label: label.to_string(),
                }],
                Vec::new(),
            ),
            target: id,
            old_label: fs.label.clone(),
            new_label,
            description,
        })
    }
}

impl Operation for SetLabelOperation {
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
        let partition = table
            .find_mut(self.target)
            .ok_or(ValidationError::NotFound(self.target))?;
        self.old_label = partition.file_system.effective().label.clone();
        partition
            .file_system
            .set_effective_label(self.new_label.clone());
        Ok(())
    }

    fn undo_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let partition = table
            .find_mut(self.target)
            .ok_or(ValidationError::NotFound(self.target))?;
        partition
            .file_system
            .set_effective_label(self.old_label.clone());
        Ok(())
    }

    fn target_mut<'a>(&'a mut self, table: &'a mut PartitionTable) -> Option<&'a mut Partition> {
        table.find_mut(self.target)
    }
}

#[cfg(test)]
mod tests {
    use layout_types::{FileSystemType, PartitionRole};

    use super::*;
    use crate::fake::extended_layout;
    use crate::operation::test_support::{full_ext4_config, scanned};

    #[test]
    fn preview_and_undo_swap_the_label() {
        let config = full_ext4_config();
        let fake = extended_layout();
        fake.set_label("/dev/sda5", "old");
        let mut device = scanned(&fake, &config);
        let id = device
            .table()
            .expect("table")
            .find_by_sector(150_000, PartitionRole::Logical.into())
            .expect("sda5")
            .id;

        let mut op = SetLabelOperation::new(&device, &config, id, "data").expect("valid label");
        assert_eq!(
            op.jobs(),
            &[Job::SetFileSystemLabel {
                label: "data".to_string()
            }]
        );

        let table = device.table_mut().expect("table");
        op.preview(table).expect("preview");
        assert_eq!(
            table.find(id).and_then(|p| p.file_system.label.clone()),
            Some("data".to_string())
        );
        op.undo(table).expect("undo");
        assert_eq!(
            table.find(id).and_then(|p| p.file_system.label.clone()),
            Some("old".to_string())
        );
    }

    #[test]
    fn unchanged_or_unsupported_labels_are_refused() {
        let config = full_ext4_config();
        let fake = extended_layout();
        fake.set_label("/dev/sda1", "root");
        fake.set_fs("/dev/sda6", FileSystemType::Xfs);
        let device = scanned(&fake, &config);
        let table = device.table().expect("table");
        let sda1 = table
            .find_by_sector(2048, PartitionRole::Primary.into())
            .expect("sda1")
            .id;
        let sda6 = table
            .find_by_sector(250_000, PartitionRole::Logical.into())
            .expect("sda6")
            .id;

        let err = SetLabelOperation::new(&device, &config, sda1, "root").err();
        assert_eq!(err, Some(ValidationError::NothingToDo));

        let err = SetLabelOperation::new(&device, &config, sda6, "data").err();
        assert_eq!(
            err,
            Some(ValidationError::Unsupported {
                fs: FileSystemType::Xfs,
                capability: FsCapability::SetLabel
            })
        );
    }
}
