// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    InvalidInput,
    NotFound,
    PermissionDenied,
    Unsupported,
    Busy,
    ToolFailed,
    Io,
    Internal,
}

impl BackendErrorKind {
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::NotFound => 404,
            Self::PermissionDenied => 403,
            Self::Unsupported => 501,
            Self::Busy => 423,
            Self::ToolFailed => 502,
            Self::Io => 503,
            Self::Internal => 500,
        }
    }
}

/// Error returned by every collaborator call
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unsupported, message)
    }

    pub fn tool_failed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ToolFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => BackendErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => BackendErrorKind::PermissionDenied,
            _ => BackendErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_roundtrips() {
        let error = BackendError::new(BackendErrorKind::Busy, "device is in use");
        let json = serde_json::to_string(&error).expect("serialize error");
        let parsed: BackendError = serde_json::from_str(&json).expect("deserialize error");
        assert_eq!(parsed, error);
        assert_eq!(error.to_string(), "Busy: device is in use");
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let err: BackendError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(err.kind, BackendErrorKind::NotFound);

        let err: BackendError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err.kind.code(), 403);
    }
}
