//! Balanced grouping of input files for the merge stage.
//!
//! Files are assigned largest-first to whichever group currently holds the
//! fewest bytes (the LPT heuristic). Ties between groups go to the lowest
//! group index and ties between equally sized files are ordered by path, so
//! the same directory always produces the same plan.
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_COUNT: NonZeroUsize = match NonZeroUsize::new(250) {
    Some(count) => count,
    None => unreachable!(),
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInput {
    pub path: PathBuf,
    pub size: u64,
}

impl PlanInput {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeGroup {
    members: Vec<PlanInput>,
    total_bytes: u64,
}

impl MergeGroup {
    fn push(&mut self, input: PlanInput) {
        self.total_bytes += input.size;
        self.members.push(input);
    }

    /// Members in assignment order; this is also the page order of the output.
    pub fn members(&self) -> &[PlanInput] {
        &self.members
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.members.iter().map(|m| m.path.as_path())
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergePlan {
    groups: Vec<MergeGroup>,
}

impl MergePlan {
    pub fn groups(&self) -> &[MergeGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn input_count(&self) -> usize {
        self.groups.iter().map(MergeGroup::len).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.groups.iter().map(MergeGroup::total_bytes).sum()
    }
}

/// Partition `inputs` into at most `count` groups with balanced byte totals.
///
/// Groups that end up without members are dropped, so the plan never asks
/// for an empty output file.
pub fn plan_merge(mut inputs: Vec<PlanInput>, count: NonZeroUsize) -> MergePlan {
    if inputs.is_empty() {
        return MergePlan::default();
    }

    inputs.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

    let bins = count.get().min(inputs.len());
    let mut groups = vec![MergeGroup::default(); bins];
    let mut loads: BinaryHeap<Reverse<(u64, usize)>> =
        (0..bins).map(|idx| Reverse((0, idx))).collect();

    for input in inputs {
        let Some(Reverse((load, idx))) = loads.pop() else {
            break;
        };
        let size = input.size;
        groups[idx].push(input);
        loads.push(Reverse((load + size, idx)));
    }

    groups.retain(|group| !group.is_empty());
    MergePlan { groups }
}

/// Output name for the group at `index` (zero based): `merged_001.pdf`, ...
pub fn merged_file_name(index: usize) -> String {
    format!("merged_{:03}.pdf", index + 1)
}
