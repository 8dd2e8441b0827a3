// SPDX-License-Identifier: GPL-3.0-only

use crate::BackendResult;

pub trait MountTable: Send + Sync {
    /// First mount point of a device node
    fn mount_point_of(&self, path: &str) -> Option<String>;

    fn is_mounted(&self, path: &str) -> bool {
        self.mount_point_of(path).is_some()
    }

    /// Live used bytes of the filesystem mounted at `mount_point`
    fn used_bytes_at(&self, mount_point: &str) -> BackendResult<u64>;
}
