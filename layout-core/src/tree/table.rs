// SPDX-License-Identifier: GPL-3.0-only

use layout_types::{Geometry, PartitionRole, PartitionRoles, SectorRange, TableInfo, TableType};
use serde::{Deserialize, Serialize};

use super::{NodeRef, Partition, PartitionId, PartitionNode};
use crate::error::ValidationError;

/// Number of the first logical partition on MS-DOS style tables
pub(crate) const FIRST_LOGICAL_NUMBER: u32 = 5;

/// Root of a device's partition tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    pub table_type: TableType,
    pub first_usable: u64,
    pub last_usable: u64,
    pub max_primaries: u32,
    children: Vec<Partition>,
    next_id: u64,
}

impl PartitionTable {
    pub fn new(info: TableInfo) -> Self {
        let mut table = Self {
            table_type: info.table_type,
            first_usable: info.first_usable,
            last_usable: info.last_usable,
            max_primaries: info.max_primaries,
            children: Vec::new(),
            next_id: 1,
        };
        table.update_unallocated();
        table
    }

    /// Like `new`, but MS-DOS tables without reported bounds get them from
    /// the device geometry. Reported bounds are always taken verbatim.
    pub fn from_info(info: TableInfo, geometry: &Geometry) -> Self {
        let mut info = info;
        if info.table_type.is_msdos() && info.last_usable == 0 {
            let bounds = TableInfo::msdos_bounds(geometry);
            info.first_usable = bounds.first;
            info.last_usable = bounds.last;
        }
        Self::new(info)
    }

    pub fn usable(&self) -> SectorRange {
        SectorRange::new(self.first_usable, self.last_usable)
    }

    pub fn allocate_id(&mut self) -> PartitionId {
        let id = PartitionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Every node below the root, depth first, free space included
    pub fn partitions(&self) -> Vec<&Partition> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.children());
        }
        out
    }

    pub fn real_partitions(&self) -> Vec<&Partition> {
        self.partitions()
            .into_iter()
            .filter(|partition| !partition.is_unallocated())
            .collect()
    }

    pub fn find(&self, id: PartitionId) -> Option<&Partition> {
        self.partitions().into_iter().find(|partition| partition.id == id)
    }

    pub fn find_mut(&mut self, id: PartitionId) -> Option<&mut Partition> {
        for child in self.children.iter_mut() {
            if child.id == id {
                return Some(child);
            }
            if child.children().iter().any(|grandchild| grandchild.id == id) {
                return child
                    .children_mut()
                    .iter_mut()
                    .find(|grandchild| grandchild.id == id);
            }
        }
        None
    }

    /// Innermost node containing `sector` whose roles intersect `filter`
    pub fn find_by_sector(&self, sector: u64, filter: PartitionRoles) -> Option<&Partition> {
        for child in &self.children {
            let nested = child.children().iter().find(|grandchild| {
                grandchild.range().contains(sector) && grandchild.roles.intersects(filter)
            });
            if nested.is_some() {
                return nested;
            }
            if child.range().contains(sector) && child.roles.intersects(filter) {
                return Some(child);
            }
        }
        None
    }

    /// Parent a partition starting at `sector` belongs under
    pub fn parent_for_sector(&self, sector: u64) -> NodeRef {
        self.find_by_sector(sector, PartitionRole::Extended.into())
            .map(|extended| NodeRef::Partition(extended.id))
            .unwrap_or(NodeRef::Table)
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.children.iter().find(|child| child.is_extended())
    }

    /// Real partitions occupying primary slots (an extended one included)
    pub fn primary_count(&self) -> u32 {
        self.real_children().count() as u32
    }

    /// Check that a partition with `roles` may occupy `range`, ignoring the
    /// partition `ignore` (the one being moved, if any). Returns its parent.
    pub fn check_insertion(
        &self,
        roles: PartitionRoles,
        range: SectorRange,
        ignore: Option<PartitionId>,
    ) -> Result<NodeRef, ValidationError> {
        if range.last < range.first {
            return Err(ValidationError::InvalidRange {
                first: range.first,
                last: range.last,
            });
        }

        let usable = self.usable();
        if !usable.contains_range(&range) {
            return Err(ValidationError::OutOfBounds {
                first: range.first,
                last: range.last,
                lower: usable.first,
                upper: usable.last,
            });
        }

        if roles.contains(PartitionRole::Logical) {
            let extended = self
                .extended()
                .filter(|extended| extended.range().contains_range(&range))
                .ok_or(ValidationError::LogicalOutsideExtended)?;
            if overlaps_sibling(extended.children(), range, ignore) {
                return Err(ValidationError::Overlap {
                    first: range.first,
                    last: range.last,
                });
            }
            return Ok(NodeRef::Partition(extended.id));
        }

        if roles.contains(PartitionRole::Extended) {
            if !self.table_type.supports_extended() {
                return Err(ValidationError::ExtendedNotSupported);
            }
            if self
                .extended()
                .is_some_and(|extended| Some(extended.id) != ignore)
            {
                return Err(ValidationError::SecondExtended);
            }
        }

        if overlaps_sibling(&self.children, range, ignore) {
            return Err(ValidationError::Overlap {
                first: range.first,
                last: range.last,
            });
        }

        if ignore.is_none() && self.primary_count() >= self.max_primaries {
            return Err(ValidationError::TooManyPrimaries(self.max_primaries));
        }

        Ok(NodeRef::Table)
    }

    /// Validate and attach a partition, replacing free space
    pub fn insert(&mut self, mut partition: Partition) -> Result<PartitionId, ValidationError> {
        partition.parent = self.check_insertion(partition.roles, partition.range(), None)?;
        let id = partition.id;
        self.attach(partition);
        Ok(id)
    }

    /// Attach under `partition.parent` without validation
    pub fn attach(&mut self, mut partition: Partition) {
        tracing::debug!(
            id = %partition.id,
            first = partition.first_sector,
            last = partition.last_sector,
            "attaching partition"
        );
        match partition.parent {
            NodeRef::Table => self.append(partition),
            NodeRef::Partition(parent_id) => match self.find_mut(parent_id) {
                Some(parent) => parent.append(partition),
                None => {
                    tracing::warn!(parent = %parent_id, "parent vanished, attaching to table");
                    partition.parent = NodeRef::Table;
                    self.append(partition);
                }
            },
        }
        self.update_unallocated();
    }

    /// Take a partition out of the tree; its space becomes free
    pub fn detach(&mut self, id: PartitionId) -> Option<Partition> {
        let parent = self.find(id)?.parent;
        let removed = match parent {
            NodeRef::Table => self.remove(id),
            NodeRef::Partition(parent_id) => self.find_mut(parent_id)?.remove(id),
        }?;
        tracing::debug!(id = %id, "detached partition");
        self.update_unallocated();
        Some(removed)
    }

    /// Drop every free-space node and synthesise fresh ones for each gap, at
    /// the top level and inside the extended partition.
    pub fn update_unallocated(&mut self) {
        let bounds = self.usable();
        fill_gaps(&mut self.children, bounds, NodeRef::Table, &mut self.next_id);
        for child in self.children.iter_mut().filter(|child| child.is_extended()) {
            let bounds = child.range();
            let parent = NodeRef::Partition(child.id);
            fill_gaps(child.children_mut(), bounds, parent, &mut self.next_id);
        }
    }

    /// Shift every logical numbered `from` or above by `shift`, renaming its
    /// device node to match.
    pub fn adjust_logical_numbers(&mut self, from: u32, shift: i32) {
        for extended in self.children.iter_mut().filter(|child| child.is_extended()) {
            for logical in extended.children_mut().iter_mut() {
                let Some(number) = logical.number.filter(|n| *n >= from) else {
                    continue;
                };
                if !logical.is_logical() {
                    continue;
                }
                let Some(renumbered) = number.checked_add_signed(shift) else {
                    continue;
                };
                logical.number = Some(renumbered);
                if let Some(path) = &logical.path {
                    let path = renumbered_path(path, renumbered);
                    tracing::debug!(from = number, to = renumbered, %path, "renumbered logical");
                    logical.path = Some(path);
                }
            }
        }
    }

    /// Children (free space included) cover the usable range, and each
    /// extended partition, exactly once
    pub fn coverage_is_complete(&self) -> bool {
        covers(&self.children, self.usable())
            && self
                .children
                .iter()
                .filter(|child| child.is_extended())
                .all(|extended| covers(extended.children(), extended.range()))
    }

    /// Logical numbers written to disk form 5, 6, 7, ... without gaps
    pub fn logical_numbers_contiguous(&self) -> bool {
        let mut numbers: Vec<u32> = self
            .real_partitions()
            .into_iter()
            .filter(|partition| partition.is_logical())
            .filter_map(|partition| partition.number)
            .collect();
        numbers.sort_unstable();
        numbers
            .iter()
            .enumerate()
            .all(|(index, number)| *number == FIRST_LOGICAL_NUMBER + index as u32)
    }
}

impl PartitionNode for PartitionTable {
    fn children(&self) -> &[Partition] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<Partition> {
        &mut self.children
    }
}

fn fill_gaps(
    children: &mut Vec<Partition>,
    bounds: SectorRange,
    parent: NodeRef,
    next_id: &mut u64,
) {
    children.retain(|child| !child.is_unallocated());
    children.sort_by_key(|child| child.first_sector);

    let mut gaps = Vec::new();
    let mut cursor = bounds.first;
    for child in children.iter() {
        if child.first_sector > cursor {
            let end = (child.first_sector - 1).min(bounds.last);
            if cursor <= end {
                gaps.push(SectorRange::new(cursor, end));
            }
        }
        cursor = cursor.max(child.last_sector.saturating_add(1));
    }
    if cursor <= bounds.last {
        gaps.push(SectorRange::new(cursor, bounds.last));
    }

    for gap in gaps {
        let id = PartitionId(*next_id);
        *next_id += 1;
        children.push(Partition::unallocated(id, parent, gap));
    }
    children.sort_by_key(|child| child.first_sector);
}

fn overlaps_sibling(children: &[Partition], range: SectorRange, ignore: Option<PartitionId>) -> bool {
    children
        .iter()
        .filter(|child| !child.is_unallocated() && Some(child.id) != ignore)
        .any(|child| child.range().overlaps(&range))
}

fn covers(children: &[Partition], bounds: SectorRange) -> bool {
    let mut expected = bounds.first;
    for child in children {
        if child.first_sector != expected {
            return false;
        }
        expected = child.last_sector.saturating_add(1);
    }
    expected == bounds.last.saturating_add(1)
}

/// "/dev/sda6" with 5 becomes "/dev/sda5"; "/dev/nvme0n1p6" becomes "/dev/nvme0n1p5"
fn renumbered_path(path: &str, number: u32) -> String {
    let stem = path.trim_end_matches(|c: char| c.is_ascii_digit());
    format!("{stem}{number}")
}
