// SPDX-License-Identifier: GPL-3.0-only

//! Undoable units of work
//!
//! An operation mutates the in-memory tree when previewed and only touches
//! the device when run. Its lifecycle is
//! `None -> Pending -> Running -> {Success, Warning, Error}`, and it can be
//! undone only while `Pending`.

mod check;
mod copy;
mod create;
mod delete;
mod label;
mod resize;

use std::fmt;

use layout_types::{
    CapabilityTable, DeviceInfo, FileSystemType, FsCapability, PartitionRole, PartitionRoles,
    Report, SectorRange,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alignment::Alignment;
use crate::config::AlignmentConfig;
use crate::error::ValidationError;
use crate::job::{Job, JobContext};
use crate::tree::{Partition, PartitionId, PartitionTable};

pub use check::CheckOperation;
pub use copy::CopyOperation;
pub use create::CreateOperation;
pub use delete::{DeleteOperation, ShredAction, can_delete, check_delete};
pub use label::SetLabelOperation;
pub use resize::ResizeOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    None,
    Pending,
    Running,
    Success,
    Warning,
    Error,
}

/// How one operation fared in an apply pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    Warning,
    Error,
    /// Not attempted because an earlier operation failed
    Skipped,
    /// Stopped or never started because the pass was cancelled
    Cancelled,
}

impl OperationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success | Self::Warning)
    }
}

/// State shared by every operation
#[derive(Debug, Clone)]
pub struct OperationCore {
    pub id: OperationId,
    pub status: OperationStatus,
    pub jobs: Vec<Job>,

    /// Advisory issues, e.g. misalignment; they never block a run
    pub warnings: Vec<String>,
}

impl OperationCore {
    pub fn new(jobs: Vec<Job>, warnings: Vec<String>) -> Self {
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        Self {
            id: OperationId::new(),
            status: OperationStatus::None,
            jobs,
            warnings,
        }
    }
}

pub trait Operation: Send {
    fn core(&self) -> &OperationCore;

    fn core_mut(&mut self) -> &mut OperationCore;

    fn description(&self) -> String;

    /// Partitions this operation touches
    fn targets(&self) -> Vec<PartitionId>;

    fn targets_partition(&self, id: PartitionId) -> bool {
        self.targets().contains(&id)
    }

    /// Partitions this operation holds exclusively while pending
    fn claims(&self) -> Vec<PartitionId> {
        Vec::new()
    }

    /// Apply this operation's change to the tree
    fn preview_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError>;

    /// Reverse exactly what `preview_tree` did
    fn undo_tree(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError>;

    /// The partition jobs act on while running
    fn target_mut<'a>(&'a mut self, table: &'a mut PartitionTable) -> Option<&'a mut Partition>;

    fn id(&self) -> OperationId {
        self.core().id
    }

    fn status(&self) -> OperationStatus {
        self.core().status
    }

    fn jobs(&self) -> &[Job] {
        &self.core().jobs
    }

    fn warnings(&self) -> &[String] {
        &self.core().warnings
    }

    fn preview(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let status = self.status();
        if status != OperationStatus::None {
            return Err(ValidationError::InvalidState {
                action: "previewed",
                status,
            });
        }
        self.preview_tree(table)?;
        self.core_mut().status = OperationStatus::Pending;
        tracing::debug!(operation = %self.description(), "previewed");
        Ok(())
    }

    fn undo(&mut self, table: &mut PartitionTable) -> Result<(), ValidationError> {
        let status = self.status();
        if status != OperationStatus::Pending {
            return Err(ValidationError::InvalidState {
                action: "undone",
                status,
            });
        }
        self.undo_tree(table)?;
        self.core_mut().status = OperationStatus::None;
        tracing::debug!(operation = %self.description(), "undone");
        Ok(())
    }

    /// Run every job in order, stopping at the first failure. Cancellation
    /// is honoured between jobs, never inside one.
    fn run(
        &mut self,
        ctx: &JobContext<'_>,
        table: &mut PartitionTable,
        parent: &mut Report,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let description = self.description();
        let report = parent.child(description.clone());
        self.core_mut().status = OperationStatus::Running;
        tracing::info!(operation = %description, "running operation");

        let jobs = self.core().jobs.clone();
        let mut outcome = OperationOutcome::Success;
        for job in &jobs {
            if cancel.is_cancelled() {
                report.line("cancelled, remaining jobs were not run");
                outcome = OperationOutcome::Cancelled;
                break;
            }
            let Some(partition) = self.target_mut(table) else {
                report.line("target partition is no longer in the tree");
                outcome = OperationOutcome::Error;
                break;
            };
            if !job.run(ctx, partition, report) {
                outcome = OperationOutcome::Error;
                break;
            }
        }

        if outcome == OperationOutcome::Success && !self.warnings().is_empty() {
            for warning in self.warnings() {
                report.line(format!("warning: {warning}"));
            }
            outcome = OperationOutcome::Warning;
        }

        self.core_mut().status = match outcome {
            OperationOutcome::Success => OperationStatus::Success,
            OperationOutcome::Warning => OperationStatus::Warning,
            _ => OperationStatus::Error,
        };
        report.set_status(outcome.as_str());
        tracing::info!(operation = %description, outcome = outcome.as_str(), "operation finished");
        outcome
    }
}

fn require(
    capabilities: &CapabilityTable,
    fs: FileSystemType,
    capability: FsCapability,
) -> Result<(), ValidationError> {
    if capabilities.supports(fs, capability) {
        Ok(())
    } else {
        Err(ValidationError::Unsupported { fs, capability })
    }
}

fn alignment_warning(
    device: &DeviceInfo,
    table: &PartitionTable,
    config: &AlignmentConfig,
    roles: PartitionRoles,
    range: SectorRange,
) -> Option<String> {
    let alignment = Alignment::new(device, table, config);
    if alignment.is_range_aligned(roles, range) {
        return None;
    }
    let limits = match table.extended() {
        Some(extended) if roles.contains(PartitionRole::Logical) => extended.range(),
        _ => table.usable(),
    };
    let proposed = alignment.relocated_and_resized(range, limits);
    Some(format!(
        "sectors {}..={} are not aligned to {} sectors, nearest aligned range is {}..={}",
        range.first,
        range.last,
        alignment.unit(),
        proposed.first,
        proposed.last
    ))
}
