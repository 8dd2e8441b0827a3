// SPDX-License-Identifier: GPL-3.0-only

//! Core configuration
//!
//! Loaded from a TOML file once at startup and then passed by reference into
//! the reconciler and every operation constructor.

use std::fs;
use std::path::Path;

use layout_types::{CapabilityTable, DEFAULT_ALIGNMENT_BYTES};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Alignment used when the backend reports no granularity
    pub fallback_bytes: u64,

    /// Treat empty or ambiguous MS-DOS tables as cylinder aligned
    pub use_cylinder_alignment: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            fallback_bytes: DEFAULT_ALIGNMENT_BYTES,
            use_cylinder_alignment: false,
        }
    }
}

impl AlignmentConfig {
    /// Fallback alignment expressed in sectors, never zero
    pub fn fallback_sectors(&self, sector_size: u64) -> u64 {
        if sector_size == 0 {
            return 1;
        }
        (self.fallback_bytes / sector_size).max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub alignment: AlignmentConfig,

    /// What each filesystem type can do on this machine
    pub capabilities: CapabilityTable,
}

impl CoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }
}
