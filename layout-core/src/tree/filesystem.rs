// SPDX-License-Identifier: GPL-3.0-only

use layout_types::FileSystemType;
use serde::{Deserialize, Serialize};

/// What the core knows about the filesystem on a partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystem {
    pub fs_type: FileSystemType,

    /// `None` when nobody could tell
    pub sectors_used: Option<u64>,

    pub label: Option<String>,
    pub uuid: Option<String>,

    /// Present only for encrypted containers
    pub crypto: Option<CryptoState>,
}

impl FileSystem {
    pub fn new(fs_type: FileSystemType) -> Self {
        Self {
            fs_type,
            sectors_used: None,
            label: None,
            uuid: None,
            crypto: None,
        }
    }

    /// The filesystem users actually see: the inner one of an open container
    pub fn effective(&self) -> &FileSystem {
        self.crypto
            .as_ref()
            .and_then(|crypto| crypto.inner.as_deref())
            .unwrap_or(self)
    }

    pub fn set_effective_label(&mut self, label: Option<String>) {
        match self
            .crypto
            .as_mut()
            .and_then(|crypto| crypto.inner.as_deref_mut())
        {
            Some(inner) => inner.label = label,
            None => self.label = label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoState {
    pub unlocked: bool,

    /// Mapped device node while unlocked
    pub mapped_path: Option<String>,

    pub inner: Option<Box<FileSystem>>,
}

impl CryptoState {
    pub fn locked() -> Self {
        Self {
            unlocked: false,
            mapped_path: None,
            inner: None,
        }
    }
}
