// SPDX-License-Identifier: GPL-3.0-only

//! Ordered, undoable sequence of operations for one device
//!
//! Operations are previewed against the tree as they are pushed and only
//! touch the device in [`OperationStack::apply`]. History before the last
//! apply is append-only; undo and redo only reach pending operations.

use layout_types::Report;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::Backends;
use crate::config::CoreConfig;
use crate::device::Device;
use crate::error::{CoreError, Result, ValidationError};
use crate::job::JobContext;
use crate::operation::{Operation, OperationId, OperationOutcome};
use crate::tree::PartitionId;

/// How one operation fared during [`OperationStack::apply`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyEntry {
    pub id: OperationId,
    pub description: String,
    pub outcome: OperationOutcome,

    /// Rendered report of the operation's jobs, empty if it never ran
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
    pub report: Report,
}

impl ApplyReport {
    pub fn outcome_of(&self, id: OperationId) -> Option<OperationOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.outcome)
    }

    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.succeeded())
    }

    pub fn first_failure(&self) -> Option<&ApplyEntry> {
        self.entries
            .iter()
            .find(|entry| entry.outcome == OperationOutcome::Error)
    }
}

pub struct OperationStack {
    device: Device,
    backends: Backends,
    config: CoreConfig,
    operations: Vec<Box<dyn Operation>>,

    /// Operations before this index have been applied
    committed: usize,
    undone: Vec<Box<dyn Operation>>,
}

impl OperationStack {
    pub fn new(device: Device, backends: Backends, config: CoreConfig) -> Self {
        Self {
            device,
            backends,
            config,
            operations: Vec::new(),
            committed: 0,
            undone: Vec::new(),
        }
    }

    /// The device as the pending operations will leave it
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn into_device(self) -> Device {
        self.device
    }

    pub fn pending(&self) -> &[Box<dyn Operation>] {
        &self.operations[self.committed..]
    }

    pub fn has_pending(&self) -> bool {
        self.committed < self.operations.len()
    }

    /// Pending operations that touch `id`
    pub fn operations_for_partition(&self, id: PartitionId) -> Vec<OperationId> {
        self.pending()
            .iter()
            .filter(|op| op.targets_partition(id))
            .map(|op| op.id())
            .collect()
    }

    /// Preview `op` against the tree and queue it
    pub fn push<O: Operation + 'static>(&mut self, op: O) -> Result<OperationId> {
        self.push_boxed(Box::new(op))
    }

    pub fn push_boxed(&mut self, mut op: Box<dyn Operation>) -> Result<OperationId> {
        self.check_claims(op.as_ref())?;
        op.preview(self.device.table_mut()?)?;

        let id = op.id();
        tracing::info!(operation = %op.description(), %id, "operation queued");
        self.operations.push(op);
        self.undone.clear();
        Ok(id)
    }

    /// Revert the most recent pending operation
    pub fn undo(&mut self) -> Result<OperationId> {
        if !self.has_pending() {
            return Err(CoreError::NothingToUndo);
        }
        let Some(mut op) = self.operations.pop() else {
            return Err(CoreError::NothingToUndo);
        };

        let undone = match self.device.table_mut() {
            Ok(table) => op.undo(table),
            Err(err) => Err(err),
        };
        if let Err(err) = undone {
            self.operations.push(op);
            return Err(err.into());
        }

        let id = op.id();
        tracing::info!(operation = %op.description(), %id, "operation undone");
        self.undone.push(op);
        Ok(id)
    }

    /// Re-apply the most recently undone operation
    pub fn redo(&mut self) -> Result<OperationId> {
        let Some(mut op) = self.undone.pop() else {
            return Err(CoreError::NothingToRedo);
        };

        let previewed = match self.device.table_mut() {
            Ok(table) => op.preview(table),
            Err(err) => Err(err),
        };
        if let Err(err) = previewed {
            self.undone.push(op);
            return Err(err.into());
        }

        let id = op.id();
        tracing::info!(operation = %op.description(), %id, "operation redone");
        self.operations.push(op);
        Ok(id)
    }

    /// Undo every pending operation, newest first. Returns how many were undone.
    pub fn clear_pending(&mut self) -> Result<usize> {
        let mut count = 0;
        while self.has_pending() {
            self.undo()?;
            count += 1;
        }
        self.undone.clear();
        Ok(count)
    }

    /// Run every pending operation in order. The first failure or a
    /// cancellation stops the pass. Operations that never started are undone
    /// newest first and moved to the redo list, so the tree reflects only
    /// what actually ran.
    pub fn apply(&mut self, cancel: &CancellationToken) -> ApplyReport {
        let ctx = JobContext {
            backends: &self.backends,
            device: &self.device.info,
        };
        let mut table = self.device.table.as_mut();
        let mut report = Report::new(format!("Apply operations on {}", self.device.info.path));
        let mut entries = Vec::new();
        let mut halted: Option<OperationOutcome> = None;
        let mut ran = 0;

        tracing::info!(
            device = %self.device.info.path,
            count = self.operations.len() - self.committed,
            "applying operations"
        );

        for op in self.operations[self.committed..].iter_mut() {
            if halted.is_none() && cancel.is_cancelled() {
                halted = Some(OperationOutcome::Cancelled);
            }

            let (outcome, text) = match (halted, table.as_deref_mut()) {
                (Some(outcome), _) => (outcome, String::new()),
                (None, Some(table)) => {
                    ran += 1;
                    let outcome = op.run(&ctx, table, &mut report, cancel);
                    let text = report
                        .children
                        .last()
                        .map(Report::to_text)
                        .unwrap_or_default();
                    (outcome, text)
                }
                (None, None) => {
                    ran += 1;
                    report.line(ValidationError::NoPartitionTable.to_string());
                    (OperationOutcome::Error, String::new())
                }
            };

            if halted.is_none() {
                halted = match outcome {
                    OperationOutcome::Cancelled => Some(OperationOutcome::Cancelled),
                    OperationOutcome::Error => Some(OperationOutcome::Skipped),
                    _ => None,
                };
            } else {
                tracing::debug!(operation = %op.description(), outcome = outcome.as_str(), "not run");
            }

            entries.push(ApplyEntry {
                id: op.id(),
                description: op.description(),
                outcome,
                text,
            });
        }

        self.committed += ran;
        self.undone.clear();
        self.return_unrun(&mut report);

        let status = if entries.iter().all(|entry| entry.outcome.succeeded()) {
            "success"
        } else {
            "FAILED"
        };
        report.set_status(status);
        tracing::info!(device = %self.device.info.path, status, "apply finished");

        ApplyReport { entries, report }
    }

    /// Undo everything past `committed`, newest first, onto the redo list
    fn return_unrun(&mut self, report: &mut Report) {
        while self.operations.len() > self.committed {
            let Some(mut op) = self.operations.pop() else {
                break;
            };
            let undone = match self.device.table_mut() {
                Ok(table) => op.undo(table),
                Err(err) => Err(err),
            };
            match undone {
                Ok(()) => {
                    tracing::debug!(operation = %op.description(), "returned to the redo list");
                    self.undone.push(op);
                }
                Err(err) => {
                    tracing::warn!(operation = %op.description(), %err, "could not revert unrun operation");
                    report.line(format!("{}: {err}", op.description()));
                }
            }
        }
    }

    /// A new operation may not touch what a pending one holds, nor hold what a
    /// pending one touches.
    fn check_claims(&self, op: &dyn Operation) -> std::result::Result<(), ValidationError> {
        let targets = op.targets();
        let claims = op.claims();
        for pending in self.pending() {
            let pending_claims = pending.claims();
            let pending_targets = pending.targets();
            let clash = targets
                .iter()
                .find(|id| pending_claims.contains(id))
                .or_else(|| claims.iter().find(|id| pending_targets.contains(id)));
            if let Some(id) = clash {
                return Err(ValidationError::AlreadyClaimed(*id));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for OperationStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationStack")
            .field("device", &self.device.info.path)
            .field("operations", &self.operations.len())
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}
