// SPDX-License-Identifier: GPL-3.0-only

pub mod block;
pub mod crypto;
pub mod filesystem;
pub mod mount;
pub mod scan;
pub mod writer;

pub use block::{BlockIo, FillPattern, SectorCopy};
pub use crypto::CryptoContainers;
pub use filesystem::FileSystemTools;
pub use mount::MountTable;
pub use scan::DeviceScanner;
pub use writer::{CreatedPartition, PartitionRequest, PartitionTableWriter};
