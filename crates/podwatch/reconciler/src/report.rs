//! Summaries of reconciliation cycles

use podwatch_types::WorkflowInstance;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why a container was left in place by the orphan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No ownership annotation, or one that cannot be decoded
    Foreign,
    /// At least one process has not terminated, or none reported yet
    NotTerminated,
    /// The owning instance is still active
    OwnerActive,
    /// The owner's state could not be read
    OwnerLookupFailed,
    /// Deletions are suppressed for this cycle
    DebugOverride,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Foreign => "foreign",
            SkipReason::NotTerminated => "not_terminated",
            SkipReason::OwnerActive => "owner_active",
            SkipReason::OwnerLookupFailed => "owner_lookup_failed",
            SkipReason::DebugOverride => "debug_override",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of missing-container detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingContainerReport {
    /// Single-container lookups issued
    pub lookups: usize,
    /// Running instances whose container was not found
    pub missing: Vec<WorkflowInstance>,
    /// Running instances that have no execution id to look up
    pub without_execution_id: Vec<WorkflowInstance>,
    pub applied: usize,
    pub dropped_closed: usize,
    /// Events the state manager failed to accept
    pub failed: usize,
}

/// Outcome of orphan garbage collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Containers in the namespace listing
    pub inspected: usize,
    pub deleted: Vec<String>,
    pub delete_failures: Vec<String>,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl OrphanReport {
    pub(crate) fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

/// Summary of one reconciliation cycle
///
/// A pass that was abandoned because a platform or state call failed is
/// `None`; nothing was dispatched for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub debug_override: bool,
    pub missing: Option<MissingContainerReport>,
    pub orphans: Option<OrphanReport>,
}

impl CycleReport {
    /// Coarse outcome label: `completed`, `partial` or `aborted`
    pub fn outcome(&self) -> &'static str {
        match (&self.missing, &self.orphans) {
            (Some(_), Some(_)) => "completed",
            (None, None) => "aborted",
            _ => "partial",
        }
    }
}
