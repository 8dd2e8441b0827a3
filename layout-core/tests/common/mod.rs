// SPDX-License-Identifier: GPL-3.0-only

#![allow(dead_code)]

use std::sync::Arc;

use layout_core::{Backends, CoreConfig, Device, OperationStack, PartitionId, Reconciler};
use layout_types::{CapabilityTable, FileSystemType, FsCapability, PartitionRole, Support};

#[path = "../../src/fake.rs"]
pub mod fake;

use fake::FakeBackend;

pub fn backends(fake: &FakeBackend) -> Backends {
    let shared = Arc::new(fake.clone());
    Backends::new(
        shared.clone(),
        shared.clone(),
        shared.clone(),
        shared.clone(),
        shared.clone(),
        shared,
    )
}

/// ext4 with every capability, the way the prober reports it when
/// e2fsprogs is installed
pub fn config() -> CoreConfig {
    let mut capabilities = CapabilityTable::new();
    for capability in [
        FsCapability::GetUsed,
        FsCapability::GetLabel,
        FsCapability::SetLabel,
        FsCapability::Create,
        FsCapability::Grow,
        FsCapability::Shrink,
        FsCapability::Check,
        FsCapability::UpdateUuid,
        FsCapability::GetUuid,
    ] {
        capabilities.set(FileSystemType::Ext4, capability, Support::Tool);
    }
    capabilities.set(FileSystemType::Ext4, FsCapability::Move, Support::Core);
    capabilities.set(FileSystemType::Ext4, FsCapability::Copy, Support::Core);
    CoreConfig::default().with_capabilities(capabilities)
}

pub fn scan(fake: &FakeBackend, path: &str) -> Device {
    let backends = backends(fake);
    let config = config();
    Reconciler::new(&backends, &config)
        .scan_device(path)
        .expect("scan succeeds")
        .device
}

pub fn stack(fake: &FakeBackend, path: &str) -> OperationStack {
    OperationStack::new(scan(fake, path), backends(fake), config())
}

pub fn partition_at(stack: &OperationStack, sector: u64, role: PartitionRole) -> PartitionId {
    stack
        .device()
        .table()
        .expect("table")
        .find_by_sector(sector, role.into())
        .expect("partition at sector")
        .id
}
