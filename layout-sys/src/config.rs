// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Knobs for the Linux tool wrappers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// e2fsck exit codes that mean "clean" or "errors corrected"
    pub fsck_ok_exit_codes: Vec<i32>,

    /// Buffer size for fills and sector copies
    pub io_chunk_bytes: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            fsck_ok_exit_codes: vec![0, 1, 2],
            io_chunk_bytes: 1024 * 1024,
        }
    }
}

impl ToolConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config = ToolConfig::from_toml_str("fsck_ok_exit_codes = [0, 1]").expect("parse");
        assert_eq!(config.fsck_ok_exit_codes, vec![0, 1]);
        assert_eq!(config.io_chunk_bytes, 1024 * 1024);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ToolConfig::load(dir.path().join("tools.toml")).expect("load");
        assert_eq!(config, ToolConfig::default());
    }
}
