// SPDX-License-Identifier: GPL-3.0-only

//! Partition table access through util-linux `sfdisk`, `blockdev` and `partx`

use std::fs;
use std::path::{Path, PathBuf};

use layout_contracts::{
    BackendError, BackendResult, CreatedPartition, DeviceScanner, MountTable, PartitionRequest,
    PartitionTableWriter,
};
use layout_types::{
    DeviceInfo, FileSystemType, Geometry, PartitionFlag, PartitionFlags, RawPartitionKind,
    RawPartitionRecord, Report, SectorRange, TableInfo, TableType,
};
use serde::Deserialize;

use crate::command::{require_tool, run_command, run_logged};
use crate::mounts::ProcMounts;
use crate::{Result, SysError};

const NO_TABLE: &str = "does not contain a recognized partition table";

const GPT_LINUX: &str = "0FC63DAF-8483-4772-8E79-3D69D8477DE4";
const GPT_SWAP: &str = "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F";
const GPT_BASIC_DATA: &str = "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7";
const GPT_LVM: &str = "E6D6D379-F507-44C2-A23C-238F2A3DF928";
const GPT_RAID: &str = "A19D880F-05FC-4D3B-A006-743F0F84911E";
const GPT_ESP: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";
const GPT_BIOS_BOOT: &str = "21686148-6449-6E6F-744E-656564454649";
const GPT_MSFT_RESERVED: &str = "E3C9E316-0B5C-4DB8-817D-F92DF00215AE";

const DOS_EXTENDED: [u32; 3] = [0x05, 0x0f, 0x85];
const DOS_HIDDEN: [u32; 7] = [0x11, 0x14, 0x16, 0x17, 0x1b, 0x1c, 0x1e];
const DOS_LBA: [u32; 3] = [0x0c, 0x0e, 0x0f];

#[derive(Debug, Deserialize)]
struct SfdiskDump {
    partitiontable: SfdiskTable,
}

/// The `partitiontable` object of `sfdisk --json`
#[derive(Debug, Clone, Deserialize)]
pub struct SfdiskTable {
    pub label: String,
    pub firstlba: Option<u64>,
    pub lastlba: Option<u64>,
    #[serde(default)]
    pub partitions: Vec<SfdiskPartition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SfdiskPartition {
    pub node: String,
    pub start: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub type_code: String,
    #[serde(default)]
    pub bootable: bool,
    pub attrs: Option<String>,
}

pub fn parse_dump(json: &str) -> Result<SfdiskTable> {
    let dump: SfdiskDump =
        serde_json::from_str(json).map_err(|err| SysError::parse("sfdisk", err.to_string()))?;
    Ok(dump.partitiontable)
}

/// `None` when the device has no partition table
fn dump(device: &str) -> Result<Option<SfdiskTable>> {
    match run_command("sfdisk", &["--json", device]) {
        Ok(json) => parse_dump(&json).map(Some),
        Err(SysError::OperationFailed(message)) if message.contains(NO_TABLE) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Trailing number of a partition node, e.g. 5 for `/dev/sda5` or `/dev/nvme0n1p5`
pub fn partition_number(node: &str) -> Option<u32> {
    let digits = node.len() - node.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    node[node.len() - digits..].parse().ok()
}

impl SfdiskTable {
    pub fn table_info(&self) -> TableInfo {
        let table_type = TableType::parse(&self.label);
        TableInfo {
            table_type,
            first_usable: self.firstlba.unwrap_or(0),
            last_usable: self.lastlba.unwrap_or(0),
            max_primaries: match table_type {
                TableType::Msdos | TableType::MsdosSectorBased => 4,
                TableType::Gpt => 128,
                TableType::Other => 16,
            },
        }
    }

    pub fn raw_records(&self) -> Vec<RawPartitionRecord> {
        let dos = TableType::parse(&self.label).is_msdos();
        self.partitions
            .iter()
            .filter_map(|partition| {
                let Some(number) = partition_number(&partition.node) else {
                    tracing::warn!(node = %partition.node, "partition node has no number");
                    return None;
                };
                let (kind, available, active) = if dos {
                    dos_entry(partition, number)
                } else {
                    gpt_entry(partition)
                };
                Some(RawPartitionRecord {
                    start: partition.start,
                    end: partition.start + partition.size.saturating_sub(1),
                    kind,
                    path: partition.node.clone(),
                    number,
                    available_flags: available,
                    active_flags: active,
                })
            })
            .collect()
    }
}

fn dos_entry(
    partition: &SfdiskPartition,
    number: u32,
) -> (RawPartitionKind, PartitionFlags, PartitionFlags) {
    let code = u32::from_str_radix(partition.type_code.trim_start_matches("0x"), 16).unwrap_or(0);
    let kind = if DOS_EXTENDED.contains(&code) {
        RawPartitionKind::Extended
    } else if number >= 5 {
        RawPartitionKind::Logical
    } else {
        RawPartitionKind::Normal
    };

    let available = PartitionFlag::Boot
        | PartitionFlag::Hidden
        | PartitionFlag::Lba
        | PartitionFlag::Raid
        | PartitionFlag::Lvm
        | PartitionFlag::Diag;
    let mut active = PartitionFlags::empty();
    if partition.bootable {
        active |= PartitionFlag::Boot;
    }
    if DOS_HIDDEN.contains(&code) {
        active |= PartitionFlag::Hidden;
    }
    if DOS_LBA.contains(&code) {
        active |= PartitionFlag::Lba;
    }
    match code {
        0x12 => active |= PartitionFlag::Diag,
        0x8e => active |= PartitionFlag::Lvm,
        0xfd => active |= PartitionFlag::Raid,
        _ => {}
    }
    (kind, available, active)
}

fn gpt_entry(partition: &SfdiskPartition) -> (RawPartitionKind, PartitionFlags, PartitionFlags) {
    let available = PartitionFlag::Boot
        | PartitionFlag::Esp
        | PartitionFlag::BiosGrub
        | PartitionFlag::MsftReserved
        | PartitionFlag::MsftData
        | PartitionFlag::Raid
        | PartitionFlag::Lvm
        | PartitionFlag::LegacyBoot;
    let mut active = match partition.type_code.to_uppercase().as_str() {
        GPT_ESP => PartitionFlag::Esp | PartitionFlag::Boot,
        GPT_BIOS_BOOT => PartitionFlag::BiosGrub.into(),
        GPT_MSFT_RESERVED => PartitionFlag::MsftReserved.into(),
        GPT_BASIC_DATA => PartitionFlag::MsftData.into(),
        GPT_RAID => PartitionFlag::Raid.into(),
        GPT_LVM => PartitionFlag::Lvm.into(),
        _ => PartitionFlags::empty(),
    };
    if partition
        .attrs
        .as_deref()
        .is_some_and(|attrs| attrs.contains("LegacyBIOSBootable"))
    {
        active |= PartitionFlag::LegacyBoot;
    }
    (RawPartitionKind::Normal, available, active)
}

/// Type code `sfdisk` should write for a new entry
pub fn type_code(label: &str, kind: RawPartitionKind, fs: FileSystemType) -> &'static str {
    if TableType::parse(label).is_msdos() {
        if kind == RawPartitionKind::Extended {
            return "5";
        }
        return match fs {
            FileSystemType::LinuxSwap => "82",
            FileSystemType::Fat16 => "6",
            FileSystemType::Fat32 => "c",
            FileSystemType::Ntfs => "7",
            FileSystemType::Lvm2Pv => "8e",
            _ => "83",
        };
    }
    match fs {
        FileSystemType::LinuxSwap => GPT_SWAP,
        FileSystemType::Fat16 | FileSystemType::Fat32 | FileSystemType::Ntfs => GPT_BASIC_DATA,
        FileSystemType::Lvm2Pv => GPT_LVM,
        _ => GPT_LINUX,
    }
}

fn device_name(path: &str) -> String {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn read_sys_string(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads geometry and tables; sysfs is consulted for model, alignment and
/// holders
#[derive(Debug, Clone)]
pub struct SfdiskScanner {
    sys_root: PathBuf,
    mounts: ProcMounts,
}

impl Default for SfdiskScanner {
    fn default() -> Self {
        Self::new("/sys", ProcMounts::default())
    }
}

impl SfdiskScanner {
    pub fn new(sys_root: impl Into<PathBuf>, mounts: ProcMounts) -> Self {
        Self {
            sys_root: sys_root.into(),
            mounts,
        }
    }

    /// Build device identity from `blockdev` figures plus sysfs
    pub fn device_info(&self, path: &str, sector_size: u64, size_512: u64) -> DeviceInfo {
        let name = device_name(path);
        let block = self.sys_root.join("block").join(&name);
        let sector_size = sector_size.max(512);
        let total_sectors = size_512.saturating_mul(512) / sector_size;

        let optimal_io = read_sys_string(&block.join("queue/optimal_io_size"))
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|bytes| *bytes >= sector_size);

        let geometry = Geometry {
            heads: 255,
            sectors_per_track: 63,
            cylinders: total_sectors / (255 * 63),
        };

        DeviceInfo {
            path: path.to_string(),
            model: read_sys_string(&block.join("device/model")).unwrap_or_default(),
            geometry,
            logical_sector_size: sector_size,
            total_sectors,
            alignment_sectors: optimal_io.map(|bytes| bytes / sector_size),
        }
    }

    fn has_holders(&self, path: &str) -> bool {
        let holders = self
            .sys_root
            .join("class/block")
            .join(device_name(path))
            .join("holders");
        fs::read_dir(holders)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

impl DeviceScanner for SfdiskScanner {
    fn probe_device(&self, path: &str) -> BackendResult<DeviceInfo> {
        if !Path::new(path).exists() {
            return Err(SysError::DeviceNotFound(path.to_string()).into());
        }
        let parse = |raw: String| {
            raw.trim()
                .parse::<u64>()
                .map_err(|err| SysError::parse("blockdev", err.to_string()))
        };
        let sector_size = parse(run_command("blockdev", &["--getss", path])?)?;
        let size_512 = parse(run_command("blockdev", &["--getsz", path])?)?;
        Ok(self.device_info(path, sector_size, size_512))
    }

    fn read_table(&self, device: &DeviceInfo) -> BackendResult<Option<TableInfo>> {
        Ok(dump(&device.path)?.map(|table| table.table_info()))
    }

    fn list_raw_partitions(&self, device: &DeviceInfo) -> BackendResult<Vec<RawPartitionRecord>> {
        Ok(dump(&device.path)?
            .map(|table| table.raw_records())
            .unwrap_or_default())
    }

    fn is_busy(&self, path: &str) -> bool {
        self.mounts.is_mounted(path) || self.has_holders(path)
    }
}

/// Writes entries with `sfdisk --no-reread` and refreshes the kernel view
/// with `partx -u`
#[derive(Debug, Clone, Copy, Default)]
pub struct SfdiskWriter;

impl SfdiskWriter {
    fn reread(report: &mut Report, device: &str) {
        if let Err(err) = run_logged(report, "partx", &["-u", device], None, &[]) {
            tracing::warn!(%device, %err, "kernel partition table was not refreshed");
            report.line(format!("warning: {err}"));
        }
    }

    fn script(range: SectorRange, type_code: Option<&str>) -> String {
        match type_code {
            Some(code) => format!(
                "start={}, size={}, type={code}\n",
                range.first,
                range.length()
            ),
            None => format!("start={}, size={}\n", range.first, range.length()),
        }
    }
}

impl PartitionTableWriter for SfdiskWriter {
    fn create_partition(
        &self,
        report: &mut Report,
        device: &str,
        request: &PartitionRequest,
    ) -> BackendResult<CreatedPartition> {
        require_tool("sfdisk")?;
        let table = dump(device)?.ok_or_else(|| {
            BackendError::not_found(format!("{device} has no partition table"))
        })?;

        let code = type_code(&table.label, request.kind, request.fs);
        let script = Self::script(request.range, Some(code));
        run_logged(
            report,
            "sfdisk",
            &["--no-reread", "--append", device],
            Some(&script),
            &[],
        )?;
        Self::reread(report, device);

        let created = dump(device)?
            .and_then(|table| {
                table
                    .partitions
                    .into_iter()
                    .find(|partition| partition.start == request.range.first)
            })
            .ok_or_else(|| SysError::parse("sfdisk", "new partition missing from the table"))?;
        let number = partition_number(&created.node)
            .ok_or_else(|| SysError::parse("sfdisk", format!("no number in {}", created.node)))?;

        Ok(CreatedPartition {
            path: created.node,
            number,
        })
    }

    fn delete_partition(&self, report: &mut Report, device: &str, number: u32) -> BackendResult<()> {
        require_tool("sfdisk")?;
        let number = number.to_string();
        run_logged(
            report,
            "sfdisk",
            &["--no-reread", "--delete", device, &number],
            None,
            &[],
        )?;
        Self::reread(report, device);
        Ok(())
    }

    fn set_partition_geometry(
        &self,
        report: &mut Report,
        device: &str,
        number: u32,
        range: SectorRange,
    ) -> BackendResult<()> {
        require_tool("sfdisk")?;
        let number = number.to_string();
        let script = Self::script(range, None);
        run_logged(
            report,
            "sfdisk",
            &["--no-reread", "-N", &number, device],
            Some(&script),
            &[],
        )?;
        Self::reread(report, device);
        Ok(())
    }
}
