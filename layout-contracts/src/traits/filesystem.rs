// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{FileSystemType, Report};

use crate::BackendResult;

/// Filesystem-specific reads and tool invocations.
///
/// Callers consult the capability table before invoking anything here; an
/// implementation asked for something it cannot do returns
/// `BackendErrorKind::Unsupported`.
pub trait FileSystemTools: Send + Sync {
    /// Signature-based type detection
    fn detect(&self, path: &str) -> BackendResult<FileSystemType>;

    /// Used capacity in bytes, `None` if the tool cannot tell
    fn read_used_capacity(&self, fs: FileSystemType, path: &str) -> BackendResult<Option<u64>>;

    fn read_label(&self, fs: FileSystemType, path: &str) -> BackendResult<Option<String>>;

    fn read_uuid(&self, fs: FileSystemType, path: &str) -> BackendResult<Option<String>>;

    fn create(&self, report: &mut Report, fs: FileSystemType, path: &str) -> BackendResult<()>;

    /// Resize the filesystem to `length_bytes`
    fn resize(
        &self,
        report: &mut Report,
        fs: FileSystemType,
        path: &str,
        length_bytes: u64,
    ) -> BackendResult<()>;

    fn check(&self, report: &mut Report, fs: FileSystemType, path: &str) -> BackendResult<()>;

    fn write_label(
        &self,
        report: &mut Report,
        fs: FileSystemType,
        path: &str,
        label: &str,
    ) -> BackendResult<()>;

    fn update_uuid(&self, report: &mut Report, fs: FileSystemType, path: &str)
    -> BackendResult<()>;
}
