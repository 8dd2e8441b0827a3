// SPDX-License-Identifier: GPL-3.0-only

/// Encrypted container state
pub trait CryptoContainers: Send + Sync {
    /// Mapped (decrypted) device node of an open container, e.g.
    /// `/dev/mapper/luks-<uuid>`
    fn mapped_device_of(&self, raw_path: &str) -> Option<String>;

    fn is_unlocked(&self, raw_path: &str) -> bool {
        self.mapped_device_of(raw_path).is_some()
    }
}
