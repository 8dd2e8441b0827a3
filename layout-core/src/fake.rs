// SPDX-License-Identifier: GPL-3.0-only

//! In-memory collaborators for tests. Every mutating call is recorded and
//! any call can be made to fail by name.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use layout_contracts::{
    BackendError, BackendResult, BlockIo, CreatedPartition, CryptoContainers, DeviceScanner,
    FileSystemTools, FillPattern, MountTable, PartitionRequest, PartitionTableWriter, SectorCopy,
};
use layout_types::{
    DeviceInfo, FileSystemType, Geometry, PartitionFlag, RawPartitionKind, RawPartitionRecord,
    Report, SectorRange, TableInfo, TableType,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clobber(String),
    Fill(String, FillPattern),
    Copy(SectorCopy),
    CreatePartition(PartitionRequest),
    DeletePartition(u32),
    SetGeometry(u32, SectorRange),
    CreateFs(FileSystemType, String),
    Resize(String, u64),
    Check(String),
    WriteLabel(String, String),
    UpdateUuid(String),
}

#[derive(Default)]
struct FakeState {
    device: Option<DeviceInfo>,
    table: Option<TableInfo>,
    records: Vec<RawPartitionRecord>,
    fs_types: HashMap<String, FileSystemType>,
    tool_used: HashMap<String, u64>,
    labels: HashMap<String, String>,
    uuids: HashMap<String, String>,
    mounts: HashMap<String, String>,
    mount_used: HashMap<String, u64>,
    busy: HashSet<String>,
    mapped: HashMap<String, String>,
    failing: HashSet<&'static str>,
    cancel_on: Option<(&'static str, CancellationToken)>,
    created: Vec<u32>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn with_device(device: DeviceInfo, table: Option<TableInfo>) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.device = Some(device);
            state.table = table;
        }
        fake
    }

    pub fn add_record(&self, record: RawPartitionRecord, fs: FileSystemType) {
        let mut state = self.state.lock().unwrap();
        state.fs_types.insert(record.path.clone(), fs);
        state.records.push(record);
    }

    pub fn set_fs(&self, path: &str, fs: FileSystemType) {
        self.state
            .lock()
            .unwrap()
            .fs_types
            .insert(path.to_string(), fs);
    }

    pub fn set_tool_used(&self, path: &str, bytes: u64) {
        self.state
            .lock()
            .unwrap()
            .tool_used
            .insert(path.to_string(), bytes);
    }

    pub fn set_label(&self, path: &str, label: &str) {
        self.state
            .lock()
            .unwrap()
            .labels
            .insert(path.to_string(), label.to_string());
    }

    pub fn set_uuid(&self, path: &str, uuid: &str) {
        self.state
            .lock()
            .unwrap()
            .uuids
            .insert(path.to_string(), uuid.to_string());
    }

    pub fn mount(&self, path: &str, mount_point: &str, used_bytes: u64) {
        let mut state = self.state.lock().unwrap();
        state.mounts.insert(path.to_string(), mount_point.to_string());
        state.mount_used.insert(mount_point.to_string(), used_bytes);
    }

    pub fn set_busy(&self, path: &str) {
        self.state.lock().unwrap().busy.insert(path.to_string());
    }

    pub fn unlock(&self, raw_path: &str, mapped_path: &str) {
        self.state
            .lock()
            .unwrap()
            .mapped
            .insert(raw_path.to_string(), mapped_path.to_string());
    }

    /// Make every call with this name fail, e.g. "delete_partition"
    pub fn fail(&self, call: &'static str) {
        self.state.lock().unwrap().failing.insert(call);
    }

    /// Cancel `token` right after the named call completes
    pub fn cancel_after(&self, call: &'static str, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on = Some((call, token));
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().unwrap().calls)
    }

    fn record(&self, report: &mut Report, name: &'static str, call: Call) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        report.line(format!("{call:?}"));
        state.calls.push(call);
        if let Some((trigger, token)) = &state.cancel_on {
            if *trigger == name {
                token.cancel();
            }
        }
        if state.failing.contains(name) {
            return Err(BackendError::tool_failed(format!("{name} failed")));
        }
        Ok(())
    }
}

impl DeviceScanner for FakeBackend {
    fn probe_device(&self, path: &str) -> BackendResult<DeviceInfo> {
        self.state
            .lock()
            .unwrap()
            .device
            .clone()
            .filter(|device| device.path == path)
            .ok_or_else(|| BackendError::not_found(path))
    }

    fn read_table(&self, _device: &DeviceInfo) -> BackendResult<Option<TableInfo>> {
        Ok(self.state.lock().unwrap().table)
    }

    fn list_raw_partitions(&self, _device: &DeviceInfo) -> BackendResult<Vec<RawPartitionRecord>> {
        Ok(self.state.lock().unwrap().records.clone())
    }

    fn is_busy(&self, path: &str) -> bool {
        self.state.lock().unwrap().busy.contains(path)
    }
}

impl FileSystemTools for FakeBackend {
    fn detect(&self, path: &str) -> BackendResult<FileSystemType> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .fs_types
            .get(path)
            .copied()
            .unwrap_or(FileSystemType::Unknown))
    }

    fn read_used_capacity(&self, _fs: FileSystemType, path: &str) -> BackendResult<Option<u64>> {
        Ok(self.state.lock().unwrap().tool_used.get(path).copied())
    }

    fn read_label(&self, _fs: FileSystemType, path: &str) -> BackendResult<Option<String>> {
        Ok(self.state.lock().unwrap().labels.get(path).cloned())
    }

    fn read_uuid(&self, _fs: FileSystemType, path: &str) -> BackendResult<Option<String>> {
        Ok(self.state.lock().unwrap().uuids.get(path).cloned())
    }

    fn create(&self, report: &mut Report, fs: FileSystemType, path: &str) -> BackendResult<()> {
        self.record(report, "create_fs", Call::CreateFs(fs, path.to_string()))
    }

    fn resize(
        &self,
        report: &mut Report,
        _fs: FileSystemType,
        path: &str,
        length_bytes: u64,
    ) -> BackendResult<()> {
        self.record(report, "resize", Call::Resize(path.to_string(), length_bytes))
    }

    fn check(&self, report: &mut Report, _fs: FileSystemType, path: &str) -> BackendResult<()> {
        self.record(report, "check", Call::Check(path.to_string()))
    }

    fn write_label(
        &self,
        report: &mut Report,
        _fs: FileSystemType,
        path: &str,
        label: &str,
    ) -> BackendResult<()> {
        self.record(
            report,
            "write_label",
            Call::WriteLabel(path.to_string(), label.to_string()),
        )
    }

    fn update_uuid(
        &self,
        report: &mut Report,
        _fs: FileSystemType,
        path: &str,
    ) -> BackendResult<()> {
        self.record(report, "update_uuid", Call::UpdateUuid(path.to_string()))
    }
}

impl MountTable for FakeBackend {
    fn mount_point_of(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().mounts.get(path).cloned()
    }

    fn used_bytes_at(&self, mount_point: &str) -> BackendResult<u64> {
        self.state
            .lock()
            .unwrap()
            .mount_used
            .get(mount_point)
            .copied()
            .ok_or_else(|| BackendError::not_found(mount_point))
    }
}

impl CryptoContainers for FakeBackend {
    fn mapped_device_of(&self, raw_path: &str) -> Option<String> {
        self.state.lock().unwrap().mapped.get(raw_path).cloned()
    }
}

impl PartitionTableWriter for FakeBackend {
    fn create_partition(
        &self,
        report: &mut Report,
        device: &str,
        request: &PartitionRequest,
    ) -> BackendResult<CreatedPartition> {
        self.record(
            report,
            "create_partition",
            Call::CreatePartition(request.clone()),
        )?;

        let mut state = self.state.lock().unwrap();
        let taken: Vec<u32> = state
            .records
            .iter()
            .map(|record| record.number)
            .chain(state.created.iter().copied())
            .collect();
        let number = match request.kind {
            RawPartitionKind::Logical => (5..).find(|n| !taken.contains(n)),
            _ => (1..).find(|n| !taken.contains(n)),
        }
        .unwrap_or(1);
        state.created.push(number);

        Ok(CreatedPartition {
            path: format!("{device}{number}"),
            number,
        })
    }

    fn delete_partition(
        &self,
        report: &mut Report,
        _device: &str,
        number: u32,
    ) -> BackendResult<()> {
        self.record(report, "delete_partition", Call::DeletePartition(number))
    }

    fn set_partition_geometry(
        &self,
        report: &mut Report,
        _device: &str,
        number: u32,
        range: SectorRange,
    ) -> BackendResult<()> {
        self.record(report, "set_geometry", Call::SetGeometry(number, range))
    }
}

impl BlockIo for FakeBackend {
    fn clobber_signatures(&self, report: &mut Report, path: &str) -> BackendResult<()> {
        self.record(report, "clobber", Call::Clobber(path.to_string()))
    }

    fn fill(&self, report: &mut Report, path: &str, pattern: FillPattern) -> BackendResult<()> {
        self.record(report, "fill", Call::Fill(path.to_string(), pattern))
    }

    fn copy_sectors(&self, report: &mut Report, copy: &SectorCopy) -> BackendResult<()> {
        self.record(report, "copy", Call::Copy(copy.clone()))
    }
}

/// A 1000000-sector disk with 512-byte sectors and no reported granularity
pub fn disk(path: &str) -> DeviceInfo {
    DeviceInfo {
        path: path.to_string(),
        model: "Fake Disk".to_string(),
        geometry: Geometry {
            heads: 255,
            sectors_per_track: 63,
            cylinders: 62,
        },
        logical_sector_size: 512,
        total_sectors: 1_000_001,
        alignment_sectors: None,
    }
}

pub fn msdos_table() -> TableInfo {
    TableInfo {
        table_type: TableType::Msdos,
        first_usable: 2048,
        last_usable: 1_000_000,
        max_primaries: 4,
    }
}

pub fn gpt_table() -> TableInfo {
    TableInfo {
        table_type: TableType::Gpt,
        first_usable: 34,
        last_usable: 1_000_000,
        max_primaries: 128,
    }
}

pub fn raw(
    path: &str,
    number: u32,
    kind: RawPartitionKind,
    start: u64,
    end: u64,
) -> RawPartitionRecord {
    let mut available = PartitionFlag::Boot | PartitionFlag::Lba;
    if kind == RawPartitionKind::Extended {
        available |= PartitionFlag::Hidden;
    }
    RawPartitionRecord {
        start,
        end,
        kind,
        path: path.to_string(),
        number,
        available_flags: available,
        active_flags: PartitionFlag::Boot.into(),
    }
}

/// /dev/sda1 primary ext4, /dev/sda2 extended holding /dev/sda5 and /dev/sda6
pub fn extended_layout() -> FakeBackend {
    let fake = FakeBackend::with_device(disk("/dev/sda"), Some(msdos_table()));
    fake.add_record(
        raw("/dev/sda1", 1, RawPartitionKind::Normal, 2048, 99_999),
        FileSystemType::Ext4,
    );
    fake.add_record(
        raw("/dev/sda2", 2, RawPartitionKind::Extended, 100_000, 500_000),
        FileSystemType::Extended,
    );
    fake.add_record(
        raw("/dev/sda5", 5, RawPartitionKind::Logical, 100_000, 200_000),
        FileSystemType::Ext4,
    );
    fake.add_record(
        raw("/dev/sda6", 6, RawPartitionKind::Logical, 200_001, 300_000),
        FileSystemType::Ext4,
    );
    fake
}
