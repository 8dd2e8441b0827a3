// SPDX-License-Identifier: GPL-3.0-only

//! Raw block-level I/O: signature wiping, overwriting and sector copies

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::FileExt;

use layout_contracts::{BackendResult, BlockIo, FillPattern, SectorCopy};
use layout_types::Report;

use crate::command::run_logged;
use crate::config::ToolConfig;
use crate::{Result, SysError};

fn open_node(path: &str, write: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                SysError::PermissionDenied(format!("Cannot open {path}"))
            }
            std::io::ErrorKind::NotFound => SysError::DeviceNotFound(path.to_string()),
            _ => SysError::Io(e),
        })
}

/// Size in bytes of a node; block devices report 0 in their metadata
fn node_size(file: &mut File) -> Result<u64> {
    let size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

#[derive(Debug, Clone, Default)]
pub struct RawBlockIo {
    config: ToolConfig,
}

impl RawBlockIo {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    fn chunk(&self) -> u64 {
        self.config.io_chunk_bytes.max(512) as u64
    }

    fn fill_node(&self, path: &str, pattern: FillPattern) -> Result<u64> {
        let mut target = open_node(path, true)?;
        let size = node_size(&mut target)?;
        let mut random = match pattern {
            FillPattern::Random => Some(File::open("/dev/urandom")?),
            FillPattern::Zero => None,
        };

        let mut buffer = vec![0u8; self.chunk() as usize];
        let mut written = 0u64;
        while written < size {
            let len = (size - written).min(buffer.len() as u64) as usize;
            if let Some(source) = random.as_mut() {
                source.read_exact(&mut buffer[..len])?;
            }
            target.write_all_at(&buffer[..len], written)?;
            written += len as u64;
        }
        target.sync_all()?;
        Ok(written)
    }

    fn copy(&self, copy: &SectorCopy) -> Result<u64> {
        let source = open_node(&copy.source, false)?;
        let target = open_node(&copy.target, true)?;

        let total = copy.length * copy.sector_size;
        let source_start = copy.source_offset * copy.sector_size;
        let target_start = copy.target_offset * copy.sector_size;
        let chunk = self.chunk().min(total.max(1));
        let mut buffer = vec![0u8; chunk as usize];

        // Moving forward over an overlap must read the tail first
        let backwards = copy.overlaps() && copy.target_offset > copy.source_offset;

        let mut done = 0u64;
        while done < total {
            let len = (total - done).min(chunk);
            let offset = if backwards { total - done - len } else { done };
            let buf = &mut buffer[..len as usize];
            source.read_exact_at(buf, source_start + offset)?;
            target.write_all_at(buf, target_start + offset)?;
            done += len;
        }
        target.sync_all()?;
        Ok(done)
    }
}

impl BlockIo for RawBlockIo {
    fn clobber_signatures(&self, report: &mut Report, path: &str) -> BackendResult<()> {
        run_logged(report, "wipefs", &["-a", path], None, &[])?;
        Ok(())
    }

    fn fill(&self, report: &mut Report, path: &str, pattern: FillPattern) -> BackendResult<()> {
        let what = match pattern {
            FillPattern::Zero => "zeros",
            FillPattern::Random => "random data",
        };
        report.line(format!("overwriting {path} with {what}"));
        let written = self.fill_node(path, pattern)?;
        tracing::info!(path, written, "node overwritten");
        report.line(format!("{written} bytes written"));
        Ok(())
    }

    fn copy_sectors(&self, report: &mut Report, copy: &SectorCopy) -> BackendResult<()> {
        report.line(format!(
            "copying {} sectors from {}@{} to {}@{}",
            copy.length, copy.source, copy.source_offset, copy.target, copy.target_offset
        ));
        let copied = self.copy(copy)?;
        report.line(format!("{copied} bytes copied"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::NamedTempFile;

    use super::*;

    fn small_chunks() -> RawBlockIo {
        RawBlockIo::new(ToolConfig {
            io_chunk_bytes: 512,
            ..ToolConfig::default()
        })
    }

    fn node_with(bytes: &[u8]) -> NamedTempFile {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), bytes).expect("write node");
        file
    }

    fn path(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    /// Sector `n` filled with byte `n`
    fn numbered_sectors(count: u8) -> Vec<u8> {
        (0..count).flat_map(|n| vec![n; 512]).collect()
    }

    #[test]
    fn zero_fill_covers_the_whole_node() {
        let node = node_with(&[0xAB; 1500]);
        let mut report = Report::new("fill");
        small_chunks()
            .fill(&mut report, &path(&node), FillPattern::Zero)
            .expect("fill");

        let contents = fs::read(node.path()).expect("read back");
        assert_eq!(contents.len(), 1500);
        assert!(contents.iter().all(|b| *b == 0));
        assert_eq!(report.lines.last().map(String::as_str), Some("1500 bytes written"));
    }

    #[test]
    fn copy_between_nodes() {
        let source = node_with(&numbered_sectors(4));
        let target = node_with(&[0u8; 4 * 512]);
        let copy = SectorCopy {
            source: path(&source),
            source_offset: 1,
            target: path(&target),
            target_offset: 0,
            length: 2,
            sector_size: 512,
        };
        small_chunks()
            .copy_sectors(&mut Report::new("copy"), &copy)
            .expect("copy");

        let contents = fs::read(target.path()).expect("read back");
        assert!(contents[..512].iter().all(|b| *b == 1));
        assert!(contents[512..1024].iter().all(|b| *b == 2));
        assert!(contents[1024..].iter().all(|b| *b == 0));
    }

    #[test]
    fn overlapping_move_to_the_right_keeps_the_data() {
        let node = node_with(&numbered_sectors(6));
        let copy = SectorCopy {
            source: path(&node),
            source_offset: 0,
            target: path(&node),
            target_offset: 2,
            length: 4,
            sector_size: 512,
        };
        small_chunks()
            .copy_sectors(&mut Report::new("move"), &copy)
            .expect("move");

        let contents = fs::read(node.path()).expect("read back");
        for (sector, expected) in [(2, 0u8), (3, 1), (4, 2), (5, 3)] {
            let range = sector * 512..(sector + 1) * 512;
            assert!(contents[range].iter().all(|b| *b == expected), "sector {sector}");
        }
    }

    #[test]
    fn overlapping_move_to_the_left_keeps_the_data() {
        let node = node_with(&numbered_sectors(6));
        let copy = SectorCopy {
            source: path(&node),
            source_offset: 2,
            target: path(&node),
            target_offset: 0,
            length: 4,
            sector_size: 512,
        };
        small_chunks()
            .copy_sectors(&mut Report::new("move"), &copy)
            .expect("move");

        let contents = fs::read(node.path()).expect("read back");
        for sector in 0..4usize {
            let range = sector * 512..(sector + 1) * 512;
            assert!(
                contents[range].iter().all(|b| *b == sector as u8 + 2),
                "sector {sector}"
            );
        }
    }

    #[test]
    fn missing_node_is_not_found() {
        let err = small_chunks()
            .fill(&mut Report::new("fill"), "/nonexistent/node", FillPattern::Zero)
            .expect_err("no such node");
        assert_eq!(err.kind, layout_contracts::BackendErrorKind::NotFound);
    }
}
