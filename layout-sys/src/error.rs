// SPDX-License-Identifier: GPL-3.0-only

use layout_contracts::{BackendError, BackendErrorKind};
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Required tool not installed: {0}")]
    ToolMissing(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Unexpected output from {tool}: {message}")]
    Parse { tool: &'static str, message: String },

    #[error("Invalid tool configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl SysError {
    pub(crate) fn parse(tool: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            tool,
            message: message.into(),
        }
    }
}

impl From<SysError> for BackendError {
    fn from(err: SysError) -> Self {
        let kind = match &err {
            SysError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                BackendErrorKind::NotFound
            }
            SysError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                BackendErrorKind::PermissionDenied
            }
            SysError::Io(_) => BackendErrorKind::Io,
            SysError::PermissionDenied(_) => BackendErrorKind::PermissionDenied,
            SysError::DeviceNotFound(_) => BackendErrorKind::NotFound,
            SysError::ToolMissing(_) => BackendErrorKind::Unsupported,
            SysError::OperationFailed(_) => BackendErrorKind::ToolFailed,
            SysError::Parse { .. } => BackendErrorKind::Internal,
            SysError::Config(_) => BackendErrorKind::InvalidInput,
        };
        BackendError::new(kind, err.to_string())
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sys_errors_map_to_backend_kinds() {
        let err: BackendError = SysError::ToolMissing("resize2fs".to_string()).into();
        assert_eq!(err.kind, BackendErrorKind::Unsupported);
        assert!(err.message.contains("resize2fs"));

        let err: BackendError =
            SysError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).into();
        assert_eq!(err.kind, BackendErrorKind::NotFound);
    }
}
