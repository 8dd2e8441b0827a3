// SPDX-License-Identifier: GPL-3.0-only

//! Linux collaborators for `layout-core`
//!
//! Partition tables are read and written with sfdisk, filesystems are driven
//! through their userspace tools, mounts come from `/proc/self/mountinfo`
//! and device details from sysfs. Every mutating call needs root.

pub mod block;
pub mod command;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fstools;
pub mod mounts;
pub mod probe;
pub mod sfdisk;

use std::sync::Arc;

use layout_core::Backends;

pub use block::RawBlockIo;
pub use config::ToolConfig;
pub use crypto::LsblkCrypto;
pub use error::{Result, SysError};
pub use fstools::LinuxFsTools;
pub use mounts::ProcMounts;
pub use probe::{probe_capabilities, probe_with};
pub use sfdisk::{SfdiskScanner, SfdiskWriter};

/// Wire up every Linux collaborator
pub fn linux_backends(config: ToolConfig) -> Backends {
    Backends::new(
        Arc::new(SfdiskScanner::default()),
        Arc::new(LinuxFsTools::new(config.clone())),
        Arc::new(ProcMounts::default()),
        Arc::new(LsblkCrypto),
        Arc::new(SfdiskWriter),
        Arc::new(RawBlockIo::new(config)),
    )
}
