// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem tools: blkid, e2fsprogs, util-linux swap tools, dosfstools

use layout_contracts::{BackendError, BackendResult, FileSystemTools};
use layout_types::{FileSystemType, Report};

use crate::command::{run_command, run_logged};
use crate::config::ToolConfig;
use crate::{Result, SysError};

fn is_ext(fs: FileSystemType) -> bool {
    matches!(
        fs,
        FileSystemType::Ext2 | FileSystemType::Ext3 | FileSystemType::Ext4
    )
}

fn is_fat(fs: FileSystemType) -> bool {
    matches!(fs, FileSystemType::Fat16 | FileSystemType::Fat32)
}

fn unsupported(fs: FileSystemType, what: &str) -> BackendError {
    BackendError::unsupported(format!("{what} is not supported for {}", fs.name()))
}

/// Used bytes from `dumpe2fs -h` output
pub fn ext_used_bytes(dumpe2fs: &str) -> Option<u64> {
    let field = |name: &str| {
        dumpe2fs.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == name)
                .then(|| value.trim().parse::<u64>().ok())
                .flatten()
        })
    };
    let count = field("Block count")?;
    let free = field("Free blocks")?;
    let size = field("Block size")?;
    Some(count.saturating_sub(free).saturating_mul(size))
}

/// One blkid tag, `None` when the filesystem has no such tag
fn blkid_tag(tag: &str, path: &str) -> Result<Option<String>> {
    match run_command("blkid", &["-p", "-o", "value", "-s", tag, path]) {
        Ok(value) => Ok(Some(value.trim().to_string()).filter(|value| !value.is_empty())),
        Err(SysError::OperationFailed(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinuxFsTools {
    config: ToolConfig,
}

impl LinuxFsTools {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    fn recreate_swap(&self, report: &mut Report, path: &str, size_kib: Option<u64>) -> Result<()> {
        let label = blkid_tag("LABEL", path)?;
        let uuid = blkid_tag("UUID", path)?;

        let mut args: Vec<String> = Vec::new();
        if let Some(label) = label {
            args.extend(["-L".to_string(), label]);
        }
        if let Some(uuid) = uuid {
            args.extend(["-U".to_string(), uuid]);
        }
        args.push(path.to_string());
        if let Some(size) = size_kib {
            args.push(size.to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_logged(report, "mkswap", &args, None, &[])?;
        Ok(())
    }
}

impl FileSystemTools for LinuxFsTools {
    fn detect(&self, path: &str) -> BackendResult<FileSystemType> {
        Ok(blkid_tag("TYPE", path)?
            .map(|kind| FileSystemType::parse(&kind))
            .unwrap_or(FileSystemType::Unknown))
    }

    fn read_used_capacity(&self, fs: FileSystemType, path: &str) -> BackendResult<Option<u64>> {
        if !is_ext(fs) {
            return Ok(None);
        }
        let output = run_command("dumpe2fs", &["-h", path])?;
        Ok(ext_used_bytes(&output))
    }

    fn read_label(&self, _fs: FileSystemType, path: &str) -> BackendResult<Option<String>> {
        Ok(blkid_tag("LABEL", path)?)
    }

    fn read_uuid(&self, _fs: FileSystemType, path: &str) -> BackendResult<Option<String>> {
        Ok(blkid_tag("UUID", path)?)
    }

    fn create(&self, report: &mut Report, fs: FileSystemType, path: &str) -> BackendResult<()> {
        match fs {
            fs if is_ext(fs) => {
                let tool = format!("mkfs.{}", fs.name());
                run_logged(report, &tool, &["-qF", path], None, &[])?;
            }
            FileSystemType::LinuxSwap => {
                run_logged(report, "mkswap", &[path], None, &[])?;
            }
            FileSystemType::Fat16 => {
                run_logged(report, "mkfs.fat", &["-F", "16", "-I", path], None, &[])?;
            }
            FileSystemType::Fat32 => {
                run_logged(report, "mkfs.fat", &["-F", "32", "-I", path], None, &[])?;
            }
            fs => return Err(unsupported(fs, "creating")),
        }
        Ok(())
    }

    fn resize(
        &self,
        report: &mut Report,
        fs: FileSystemType,
        path: &str,
        length_bytes: u64,
    ) -> BackendResult<()> {
        let kib = length_bytes / 1024;
        match fs {
            fs if is_ext(fs) => {
                let size = format!("{kib}K");
                run_logged(report, "resize2fs", &[path, &size], None, &[])?;
            }
            FileSystemType::LinuxSwap => self.recreate_swap(report, path, Some(kib))?,
            fs => return Err(unsupported(fs, "resizing")),
        }
        Ok(())
    }

    fn check(&self, report: &mut Report, fs: FileSystemType, path: &str) -> BackendResult<()> {
        match fs {
            fs if is_ext(fs) => {
                run_logged(
                    report,
                    "e2fsck",
                    &["-f", "-y", "-v", path],
                    None,
                    &self.config.fsck_ok_exit_codes,
                )?;
            }
            fs if is_fat(fs) => {
                run_logged(report, "fsck.fat", &["-a", "-w", "-v", path], None, &[1])?;
            }
            fs => return Err(unsupported(fs, "checking")),
        }
        Ok(())
    }

    fn write_label(
        &self,
        report: &mut Report,
        fs: FileSystemType,
        path: &str,
        label: &str,
    ) -> BackendResult<()> {
        match fs {
            fs if is_ext(fs) => {
                run_logged(report, "e2label", &[path, label], None, &[])?;
            }
            FileSystemType::LinuxSwap => {
                run_logged(report, "swaplabel", &["-L", label, path], None, &[])?;
            }
            fs if is_fat(fs) => {
                run_logged(report, "fatlabel", &[path, label], None, &[])?;
            }
            fs => return Err(unsupported(fs, "labelling")),
        }
        Ok(())
    }

    fn update_uuid(
        &self,
        report: &mut Report,
        fs: FileSystemType,
        path: &str,
    ) -> BackendResult<()> {
        match fs {
            fs if is_ext(fs) => {
                run_logged(report, "tune2fs", &["-U", "random", path], None, &[])?;
            }
            FileSystemType::LinuxSwap => {
                let uuid = uuid::Uuid::new_v4().to_string();
                run_logged(report, "swaplabel", &["-U", &uuid, path], None, &[])?;
            }
            fs => return Err(unsupported(fs, "changing the UUID")),
        }
        Ok(())
    }
}
