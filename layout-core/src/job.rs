// SPDX-License-Identifier: GPL-3.0-only

//! Primitive device mutations
//!
//! A job wraps exactly one collaborator call. It never returns an error:
//! failures become report lines and a `false` result.

use layout_contracts::{
    BackendError, BackendErrorKind, BackendResult, FillPattern, PartitionRequest, SectorCopy,
};
use layout_types::{
    DeviceInfo, FileSystemType, PartitionRole, RawPartitionKind, Report, SectorRange,
    bytes_to_pretty,
};
use serde::Serialize;

use crate::backend::Backends;
use crate::tree::{Partition, PartitionState};

/// What a job needs besides its partition
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub backends: &'a Backends,
    pub device: &'a DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    DeleteFileSystem,
    ShredFileSystem { random: bool },
    DeletePartition,
    CreatePartition,
    CreateFileSystem,
    SetPartitionGeometry { range: SectorRange },
    /// New filesystem length in sectors
    ResizeFileSystem { length: u64 },
    /// Copy `length` sectors from `from_first` to the partition's first sector
    MoveFileSystem { from_first: u64, length: u64 },
    CopyFileSystem { source_path: String, length: u64 },
    CheckFileSystem,
    SetFileSystemLabel { label: String },
    UpdateUuid,
}

impl Job {
    pub fn description(&self, partition: &Partition, device: &DeviceInfo) -> String {
        let path = partition.display_path();
        match self {
            Self::DeleteFileSystem => format!("Delete file system on {path}"),
            Self::ShredFileSystem { random: false } => format!("Zero file system on {path}"),
            Self::ShredFileSystem { random: true } => {
                format!("Overwrite file system on {path} with random data")
            }
            Self::DeletePartition => format!("Delete the partition {path}"),
            Self::CreatePartition => format!(
                "Create new {} partition on {}",
                layout_types::role_name(partition.roles),
                device.path
            ),
            Self::CreateFileSystem => format!(
                "Create file system {} on {path}",
                partition.file_system.fs_type.name()
            ),
            Self::SetPartitionGeometry { range } => format!(
                "Set geometry of {path}: start sector {}, length {}",
                range.first,
                range.length()
            ),
            Self::ResizeFileSystem { length } => format!(
                "Resize file system on {path} to {}",
                bytes_to_pretty(&length.saturating_mul(device.logical_sector_size), false)
            ),
            Self::MoveFileSystem { from_first, .. } => format!(
                "Move file system on {path} from sector {from_first} to {}",
                partition.first_sector
            ),
            Self::CopyFileSystem { source_path, .. } => {
                format!("Copy file system from {source_path} to {path}")
            }
            Self::CheckFileSystem => format!("Check file system on {path}"),
            Self::SetFileSystemLabel { label } => {
                format!("Set the file system label on {path} to \"{label}\"")
            }
            Self::UpdateUuid => format!("Update the UUID of the file system on {path}"),
        }
    }

    /// Execute against the real device, writing a child report into `parent`
    pub fn run(&self, ctx: &JobContext<'_>, partition: &mut Partition, parent: &mut Report) -> bool {
        let report = parent.child(self.description(partition, ctx.device));
        tracing::info!(job = %report.title, "running job");

        match self.execute(ctx, partition, report) {
            Ok(()) => {
                report.set_status("finished");
                true
            }
            Err(err) => {
                tracing::warn!(job = %report.title, %err, "job failed");
                report.line(err.to_string());
                report.set_status("FAILED");
                false
            }
        }
    }

    fn execute(
        &self,
        ctx: &JobContext<'_>,
        partition: &mut Partition,
        report: &mut Report,
    ) -> BackendResult<()> {
        let device = ctx.device.path.as_str();
        let sector_size = ctx.device.logical_sector_size;

        match self {
            Self::DeleteFileSystem => {
                if matches!(
                    partition.file_system.fs_type,
                    FileSystemType::Extended | FileSystemType::Unformatted
                ) {
                    report.line("no file system to erase");
                    return Ok(());
                }
                ctx.backends
                    .block_io()
                    .clobber_signatures(report, node_path(partition)?)
            }
            Self::ShredFileSystem { random } => {
                let pattern = if *random {
                    FillPattern::Random
                } else {
                    FillPattern::Zero
                };
                ctx.backends
                    .block_io()
                    .fill(report, node_path(partition)?, pattern)
            }
            Self::DeletePartition => ctx
                .backends
                .writer()
                .delete_partition(report, device, node_number(partition)?),
            Self::CreatePartition => {
                let request = PartitionRequest {
                    range: partition.range(),
                    kind: raw_kind(partition),
                    fs: partition.file_system.fs_type,
                };
                let created = ctx
                    .backends
                    .writer()
                    .create_partition(report, device, &request)?;
                report.line(format!("created {} as number {}", created.path, created.number));
                partition.path = Some(created.path);
                partition.number = Some(created.number);
                partition.state = PartitionState::Existing;
                Ok(())
            }
            Self::CreateFileSystem => {
                let (fs, path) = fs_target(partition)?;
                ctx.backends.fs_tools().create(report, fs, &path)
            }
            Self::SetPartitionGeometry { range } => ctx.backends.writer().set_partition_geometry(
                report,
                device,
                node_number(partition)?,
                *range,
            ),
            Self::ResizeFileSystem { length } => {
                let (fs, path) = fs_target(partition)?;
                ctx.backends
                    .fs_tools()
                    .resize(report, fs, &path, length.saturating_mul(sector_size))
            }
            Self::MoveFileSystem { from_first, length } => {
                let copy = SectorCopy {
                    source: device.to_string(),
                    source_offset: *from_first,
                    target: device.to_string(),
                    target_offset: partition.first_sector,
                    length: *length,
                    sector_size,
                };
                ctx.backends.block_io().copy_sectors(report, &copy)
            }
            Self::CopyFileSystem {
                source_path,
                length,
            } => {
                let copy = SectorCopy {
                    source: source_path.clone(),
                    source_offset: 0,
                    target: node_path(partition)?.to_string(),
                    target_offset: 0,
                    length: *length,
                    sector_size,
                };
                ctx.backends.block_io().copy_sectors(report, &copy)
            }
            Self::CheckFileSystem => {
                let (fs, path) = fs_target(partition)?;
                ctx.backends.fs_tools().check(report, fs, &path)
            }
            Self::SetFileSystemLabel { label } => {
                let (fs, path) = fs_target(partition)?;
                ctx.backends.fs_tools().write_label(report, fs, &path, label)
            }
            Self::UpdateUuid => {
                let (fs, path) = fs_target(partition)?;
                ctx.backends.fs_tools().update_uuid(report, fs, &path)
            }
        }
    }
}

fn node_path(partition: &Partition) -> BackendResult<&str> {
    partition.path.as_deref().ok_or_else(|| {
        BackendError::new(
            BackendErrorKind::InvalidInput,
            "partition has no device node yet",
        )
    })
}

fn node_number(partition: &Partition) -> BackendResult<u32> {
    partition.number.ok_or_else(|| {
        BackendError::new(
            BackendErrorKind::InvalidInput,
            "partition has no partition number yet",
        )
    })
}

/// Filesystem tools act on the inner filesystem of an open container
fn fs_target(partition: &Partition) -> BackendResult<(FileSystemType, String)> {
    let open = partition
        .file_system
        .crypto
        .as_ref()
        .and_then(|crypto| crypto.mapped_path.as_ref().zip(crypto.inner.as_ref()));
    if let Some((mapped, inner)) = open {
        return Ok((inner.fs_type, mapped.clone()));
    }
    Ok((
        partition.file_system.fs_type,
        node_path(partition)?.to_string(),
    ))
}

fn raw_kind(partition: &Partition) -> RawPartitionKind {
    if partition.roles.contains(PartitionRole::Extended) {
        RawPartitionKind::Extended
    } else if partition.roles.contains(PartitionRole::Logical) {
        RawPartitionKind::Logical
    } else {
        RawPartitionKind::Normal
    }
}
