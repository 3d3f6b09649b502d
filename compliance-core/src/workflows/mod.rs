//! Mutation workflows
//!
//! Every workflow follows the same shape: check preconditions, set a pending
//! marker, make the call, then either upsert the confirmed rows into the
//! mirror and revalidate, or surface the failure and leave the mirror alone.
//! The workflows are methods on [`crate::controller::ListController`], split by
//! concern across the submodules.

mod archive;
mod complete;
mod triage;

use std::fmt;

use crate::error::ValidationError;

/// Why a workflow did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCompleted,
    /// Completion is not offered before triage
    AwaitingTriage,
    AlreadyArchived,
    NotArchived,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyCompleted => write!(f, "already completed"),
            SkipReason::AwaitingTriage => write!(f, "awaiting triage"),
            SkipReason::AlreadyArchived => write!(f, "already archived"),
            SkipReason::NotArchived => write!(f, "not archived"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Skipped(SkipReason),
    /// The user dismissed a dialog
    Cancelled,
}

/// Trimmed, non-empty archive reason
pub(crate) fn normalize_reason(reason: &str) -> Result<String, ValidationError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::EmptyReason);
    }
    Ok(reason.to_string())
}
