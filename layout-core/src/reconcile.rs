// SPDX-License-Identifier: GPL-3.0-only

//! Builds a partition tree from what the backend reports
//!
//! Reconciliation only reads: it never issues a mutating collaborator call,
//! and a rescan always replaces the previous tree wholesale.

use layout_contracts::{BackendResult, FileSystemTools};
use layout_types::{
    DeviceInfo, FileSystemType, FsCapability, PartitionRole, PartitionRoles, RawPartitionKind,
    RawPartitionRecord, TableInfo, TableType, misreported_flags,
};
use serde::Serialize;

use crate::alignment::{Alignment, sector_alignment};
use crate::backend::Backends;
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::Result;
use crate::tree::{
    CryptoState, FileSystem, MountState, Partition, PartitionNode, PartitionState, PartitionTable,
};

/// A reconciled table plus everything worth telling the user about it
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub table: PartitionTable,

    /// Records that could not be represented
    pub diagnostics: Vec<String>,

    /// Misaligned partitions
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub device: Device,
    pub diagnostics: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct Reconciler<'a> {
    backends: &'a Backends,
    config: &'a CoreConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(backends: &'a Backends, config: &'a CoreConfig) -> Self {
        Self { backends, config }
    }

    /// Probe a device, read its table and reconcile it
    pub fn scan_device(&self, path: &str) -> Result<ScanOutcome> {
        let scanner = self.backends.scanner();
        let info = scanner.probe_device(path)?;

        let Some(table_info) = scanner.read_table(&info)? else {
            tracing::info!(device = %path, "no partition table");
            return Ok(ScanOutcome {
                device: Device::new(info, None),
                diagnostics: Vec::new(),
                warnings: Vec::new(),
            });
        };

        let records = scanner.list_raw_partitions(&info)?;
        tracing::info!(device = %path, records = records.len(), "reconciling partition table");
        let reconciled = self.reconcile(&info, table_info, records);

        Ok(ScanOutcome {
            device: Device::new(info, Some(reconciled.table)),
            diagnostics: reconciled.diagnostics,
            warnings: reconciled.warnings,
        })
    }

    pub fn reconcile(
        &self,
        device: &DeviceInfo,
        table_info: TableInfo,
        mut records: Vec<RawPartitionRecord>,
    ) -> Reconciliation {
        let mut table = PartitionTable::from_info(table_info, &device.geometry);
        let mut diagnostics = Vec::new();

        records.sort_by_key(|record| record.start);
        for record in records {
            let role = match record.kind {
                RawPartitionKind::Normal => PartitionRole::Primary,
                RawPartitionKind::Extended => PartitionRole::Extended,
                RawPartitionKind::Logical => PartitionRole::Logical,
                RawPartitionKind::Other => {
                    let message = format!(
                        "skipping {} ({}..={}): unsupported entry kind",
                        record.path, record.start, record.end
                    );
                    tracing::warn!("{message}");
                    diagnostics.push(message);
                    continue;
                }
            };
            if record.number < 1 {
                let message = format!("skipping {}: no partition number", record.path);
                tracing::warn!("{message}");
                diagnostics.push(message);
                continue;
            }

            let parent = table.parent_for_sector(record.start);
            let (file_system, mount) = if role == PartitionRole::Extended {
                (FileSystem::new(FileSystemType::Extended), MountState::default())
            } else {
                self.load_file_system(device, &record.path)
            };

            let mut roles: PartitionRoles = role.into();
            if file_system.fs_type == FileSystemType::Luks {
                roles |= PartitionRole::Luks;
            }

            let id = table.allocate_id();
            let mut partition = Partition::new(
                id,
                parent,
                roles,
                record.range(),
                file_system,
                PartitionState::Existing,
            );
            partition.path = Some(record.path.clone());
            partition.number = Some(record.number);
            partition.available_flags = record.available_flags & !misreported_flags(record.kind);
            partition.active_flags = record.active_flags & partition.available_flags;
            partition.mount = mount;

            tracing::debug!(
                path = %record.path,
                role = ?role,
                fs = partition.file_system.fs_type.name(),
                mounted = partition.mount.mounted,
                "reconciled partition"
            );
            table.attach(partition);
        }

        table.update_unallocated();

        if table.table_type.is_msdos() {
            table.table_type = if is_sector_based(&table, device, self.config) {
                TableType::MsdosSectorBased
            } else {
                TableType::Msdos
            };
        }

        let warnings = mark_misaligned(&mut table, device, self.config);
        Reconciliation {
            table,
            diagnostics,
            warnings,
        }
    }

    fn load_file_system(&self, device: &DeviceInfo, path: &str) -> (FileSystem, MountState) {
        let fs_type = self.detect(path);
        if fs_type == FileSystemType::Luks {
            return self.load_crypto(device, path);
        }

        let mount_point = self.backends.mounts().mount_point_of(path);
        let mounted = mount_point.is_some() || self.backends.scanner().is_busy(path);
        let file_system = self.read_details(device, fs_type, path, mount_point.as_deref());
        (
            file_system,
            MountState {
                mounted,
                mount_point,
            },
        )
    }

    /// An encrypted container's mount state and usage come from its mapped
    /// node, and only an unlocked container has an inner filesystem.
    fn load_crypto(&self, device: &DeviceInfo, raw_path: &str) -> (FileSystem, MountState) {
        let crypto = self.backends.crypto();
        let mut file_system = FileSystem::new(FileSystemType::Luks);
        let mut state = CryptoState::locked();
        let mut mount = MountState::default();

        if crypto.is_unlocked(raw_path) {
            state.unlocked = true;
            if let Some(mapped) = crypto.mapped_device_of(raw_path) {
                let mount_point = self.backends.mounts().mount_point_of(&mapped);
                let inner = self.load_inner_file_system(device, &mapped, mount_point.as_deref());
                file_system.sectors_used = inner.sectors_used;
                mount = MountState {
                    mounted: mount_point.is_some(),
                    mount_point,
                };
                state.mapped_path = Some(mapped);
                state.inner = Some(Box::new(inner));
            }
        }

        if self
            .config
            .capabilities
            .supports(FileSystemType::Luks, FsCapability::GetUuid)
        {
            file_system.uuid = self.read_or_log("uuid", raw_path, |tools| {
                tools.read_uuid(FileSystemType::Luks, raw_path)
            });
        }

        file_system.crypto = Some(state);
        (file_system, mount)
    }

    /// Detect and read the filesystem inside an open container
    pub fn load_inner_file_system(
        &self,
        device: &DeviceInfo,
        mapped_path: &str,
        mount_point: Option<&str>,
    ) -> FileSystem {
        let fs_type = self.detect(mapped_path);
        self.read_details(device, fs_type, mapped_path, mount_point)
    }

    fn detect(&self, path: &str) -> FileSystemType {
        match self.backends.fs_tools().detect(path) {
            Ok(fs_type) => fs_type,
            Err(err) => {
                tracing::warn!(%path, %err, "filesystem detection failed");
                FileSystemType::Unknown
            }
        }
    }

    fn read_details(
        &self,
        device: &DeviceInfo,
        fs_type: FileSystemType,
        path: &str,
        mount_point: Option<&str>,
    ) -> FileSystem {
        let capabilities = &self.config.capabilities;
        let mut file_system = FileSystem::new(fs_type);

        let used_bytes = match mount_point {
            Some(mount_point) => match self.backends.mounts().used_bytes_at(mount_point) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    tracing::warn!(%mount_point, %err, "could not read mount usage");
                    None
                }
            },
            None if capabilities.supports(fs_type, FsCapability::GetUsed) => {
                self.read_or_log("used capacity", path, |tools| {
                    tools.read_used_capacity(fs_type, path)
                })
            }
            None => None,
        };
        let sector_size = device.logical_sector_size.max(1);
        file_system.sectors_used = used_bytes.map(|bytes| bytes.div_ceil(sector_size));

        if capabilities.supports(fs_type, FsCapability::GetLabel) {
            file_system.label =
                self.read_or_log("label", path, |tools| tools.read_label(fs_type, path));
        }
        if capabilities.supports(fs_type, FsCapability::GetUuid) {
            file_system.uuid =
                self.read_or_log("uuid", path, |tools| tools.read_uuid(fs_type, path));
        }

        file_system
    }

    fn read_or_log<T>(
        &self,
        what: &str,
        path: &str,
        read: impl FnOnce(&dyn FileSystemTools) -> BackendResult<Option<T>>,
    ) -> Option<T> {
        let tools = self.backends.fs_tools();
        match read(tools.as_ref()) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%path, %err, "could not read {what}");
                None
            }
        }
    }
}

/// Whether an MS-DOS table's partitions follow sector rather than cylinder
/// alignment. Empty tables and ties follow the configuration.
pub fn is_sector_based(table: &PartitionTable, device: &DeviceInfo, config: &CoreConfig) -> bool {
    let sector_unit = sector_alignment(device, &config.alignment).max(1);
    let cylinder = device.geometry.cylinder_size();

    let mut sector_aligned = 0u32;
    let mut cylinder_aligned = 0u32;
    for partition in table.real_children() {
        if partition.first_sector % sector_unit == 0 {
            sector_aligned += 1;
        } else if cylinder > 0 && partition.first_sector % cylinder == 0 {
            cylinder_aligned += 1;
        }
    }

    if sector_aligned == cylinder_aligned {
        !config.alignment.use_cylinder_alignment
    } else {
        sector_aligned > cylinder_aligned
    }
}

fn mark_misaligned(table: &mut PartitionTable, device: &DeviceInfo, config: &CoreConfig) -> Vec<String> {
    let alignment = Alignment::new(device, table, &config.alignment);
    let misaligned: Vec<_> = table
        .real_partitions()
        .into_iter()
        .filter(|partition| !alignment.is_aligned(partition))
        .map(|partition| (partition.id, partition.display_path()))
        .collect();

    let mut warnings = Vec::new();
    for (id, path) in misaligned {
        if let Some(partition) = table.find_mut(id) {
            partition.misaligned = true;
        }
        let message = format!("{path} is not aligned to {} sectors", alignment.unit());
        tracing::warn!("{message}");
        warnings.push(message);
    }
    warnings
}
