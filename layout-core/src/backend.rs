// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use layout_contracts::{
    BlockIo, CryptoContainers, DeviceScanner, FileSystemTools, MountTable, PartitionTableWriter,
};

/// The set of collaborators the core talks to
#[derive(Clone)]
pub struct Backends {
    scanner: Arc<dyn DeviceScanner>,
    fs_tools: Arc<dyn FileSystemTools>,
    mounts: Arc<dyn MountTable>,
    crypto: Arc<dyn CryptoContainers>,
    writer: Arc<dyn PartitionTableWriter>,
    block_io: Arc<dyn BlockIo>,
}

impl Backends {
    pub fn new(
        scanner: Arc<dyn DeviceScanner>,
        fs_tools: Arc<dyn FileSystemTools>,
        mounts: Arc<dyn MountTable>,
        crypto: Arc<dyn CryptoContainers>,
        writer: Arc<dyn PartitionTableWriter>,
        block_io: Arc<dyn BlockIo>,
    ) -> Self {
        Self {
            scanner,
            fs_tools,
            mounts,
            crypto,
            writer,
            block_io,
        }
    }

    pub fn scanner(&self) -> Arc<dyn DeviceScanner> {
        self.scanner.clone()
    }

    pub fn fs_tools(&self) -> Arc<dyn FileSystemTools> {
        self.fs_tools.clone()
    }

    pub fn mounts(&self) -> Arc<dyn MountTable> {
        self.mounts.clone()
    }

    pub fn crypto(&self) -> Arc<dyn CryptoContainers> {
        self.crypto.clone()
    }

    pub fn writer(&self) -> Arc<dyn PartitionTableWriter> {
        self.writer.clone()
    }

    pub fn block_io(&self) -> Arc<dyn BlockIo> {
        self.block_io.clone()
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

#[cfg(test)]
impl Backends {
    pub(crate) fn fake(fake: &crate::fake::FakeBackend) -> Self {
        let shared = Arc::new(fake.clone());
        Self::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared,
        )
    }
}
