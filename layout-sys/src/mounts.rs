// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::CString;
use std::fs;
use std::mem::MaybeUninit;
use std::path::{Path, PathBuf};

use layout_contracts::{BackendResult, MountTable};

use crate::{Result, SysError};

/// One line of `/proc/self/mountinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub mount_point: String,
    pub fs_type: String,
}

pub fn parse_mountinfo(input: &str) -> Result<Vec<MountEntry>> {
    let mut entries = Vec::new();

    for line in input.lines().filter(|line| !line.trim().is_empty()) {
        let invalid = || SysError::parse("mountinfo", line.to_string());
        let (left, right) = line.split_once(" - ").ok_or_else(invalid)?;

        let mount_point = left.split_whitespace().nth(4).ok_or_else(invalid)?;
        let mut right_fields = right.split_whitespace();
        let fs_type = right_fields.next().ok_or_else(invalid)?;
        let source = right_fields.next().ok_or_else(invalid)?;

        entries.push(MountEntry {
            source: unescape_mount_field(source),
            mount_point: unescape_mount_field(mount_point),
            fs_type: fs_type.to_string(),
        });
    }

    Ok(entries)
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(u8::is_ascii_digit)
        {
            if let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8) {
                output.push(num as char);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index] as char);
        index += 1;
    }

    output
}

/// Used bytes of the filesystem mounted at `mount_point`
pub fn used_bytes(mount_point: &str) -> Result<u64> {
    let mount_point_c = CString::new(mount_point)
        .map_err(|_| SysError::OperationFailed(format!("NUL byte in {mount_point:?}")))?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    let rc = unsafe { libc::statvfs(mount_point_c.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let stat = unsafe { stat.assume_init() };
    let frsize = if stat.f_frsize > 0 {
        stat.f_frsize
    } else {
        stat.f_bsize
    };
    #[allow(clippy::useless_conversion)]
    let (blocks, free, frsize) = (
        u64::from(stat.f_blocks),
        u64::from(stat.f_bfree),
        u64::from(frsize),
    );
    Ok(blocks.saturating_sub(free).saturating_mul(frsize))
}

/// Mount table read from procfs on every query
#[derive(Debug, Clone)]
pub struct ProcMounts {
    mountinfo: PathBuf,
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new("/proc/self/mountinfo")
    }
}

impl ProcMounts {
    pub fn new(mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: mountinfo.into(),
        }
    }

    pub fn entries(&self) -> Result<Vec<MountEntry>> {
        parse_mountinfo(&fs::read_to_string(&self.mountinfo)?)
    }

    fn find(&self, path: &str) -> Result<Option<MountEntry>> {
        let wanted = canonical(path);
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.source == path || canonical(&entry.source) == wanted))
    }
}

fn canonical(path: &str) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| Path::new(path).to_path_buf())
}

impl MountTable for ProcMounts {
    fn mount_point_of(&self, path: &str) -> Option<String> {
        match self.find(path) {
            Ok(entry) => entry.map(|entry| entry.mount_point),
            Err(err) => {
                tracing::warn!(%path, %err, "could not read the mount table");
                None
            }
        }
    }

    fn used_bytes_at(&self, mount_point: &str) -> BackendResult<u64> {
        Ok(used_bytes(mount_point)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = "36 25 8:2 / / rw,relatime - ext4 /dev/sda2 rw\n\
37 25 0:5 / /proc rw,nosuid - proc proc rw\n\
40 25 253:0 / /mnt/my\\040data rw - ext4 /dev/mapper/luks-1234 rw\n";

    #[test]
    fn parses_sources_and_escaped_mount_points() {
        let entries = parse_mountinfo(SAMPLE).expect("parse should succeed");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].source, "/dev/sda2");
        assert_eq!(entries[0].mount_point, "/");
        assert_eq!(entries[2].mount_point, "/mnt/my data");
        assert_eq!(entries[2].fs_type, "ext4");
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse_mountinfo("36 25 8:2 / /\n").is_err());
    }

    #[test]
    fn looks_up_mount_points_by_source() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write sample");
        let mounts = ProcMounts::new(file.path());

        assert_eq!(
            mounts.mount_point_of("/dev/mapper/luks-1234").as_deref(),
            Some("/mnt/my data")
        );
        assert!(mounts.is_mounted("/dev/sda2"));
        assert!(!mounts.is_mounted("/dev/sdz9"));
    }

    #[test]
    fn statvfs_reports_usage_of_a_real_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().to_str().expect("utf-8 temp path");
        assert!(used_bytes(path).is_ok());
    }
}
