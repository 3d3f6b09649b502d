//! Presentation status derivation
//!
//! Maps the raw lifecycle fields of a requirement to the single status shown
//! in the console. Rules are evaluated top to bottom and the first match wins:
//!
//! 1. archive state archived/deleted, or raw ARCHIVED -> `Archived`
//! 2. raw PENDING_REVIEW -> `Overdue` or `NeedsTriage`
//! 3. raw DONE / READY -> `Overdue` or `Completed`
//! 4. raw REVIEW -> `Overdue` or `NeedsReview`
//! 5. anything else -> `Overdue` or `Open`
//!
//! Overdue is decided on UTC calendar days, so a due date of today is never
//! overdue and a record without a due date never is.

use chrono::{NaiveDate, Utc};
use std::fmt;

use crate::models::{ArchiveState, RawStatus, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedStatus {
    Open,
    NeedsReview,
    NeedsTriage,
    Completed,
    Archived,
    Overdue,
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedStatus::Open => write!(f, "Open"),
            DerivedStatus::NeedsReview => write!(f, "Needs review"),
            DerivedStatus::NeedsTriage => write!(f, "Needs triage"),
            DerivedStatus::Completed => write!(f, "Completed"),
            DerivedStatus::Archived => write!(f, "Archived"),
            DerivedStatus::Overdue => write!(f, "Overdue"),
        }
    }
}

/// Source of "today" for overdue checks
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Today's UTC calendar date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to one date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Whole calendar days from `today` until `due` (negative once past)
pub fn days_until(due: NaiveDate, today: NaiveDate) -> i64 {
    due.signed_duration_since(today).num_days()
}

pub fn is_overdue(due: Option<NaiveDate>, today: NaiveDate) -> bool {
    due.is_some_and(|d| days_until(d, today) < 0)
}

pub fn derive_status(record: &Requirement, today: NaiveDate) -> DerivedStatus {
    let archive_state = record.archive_metadata().state;
    if matches!(
        archive_state,
        Some(ArchiveState::Archived) | Some(ArchiveState::Deleted)
    ) || record.status == Some(RawStatus::Archived)
    {
        return DerivedStatus::Archived;
    }

    let settled = match record.status {
        Some(RawStatus::PendingReview) => DerivedStatus::NeedsTriage,
        Some(RawStatus::Done) | Some(RawStatus::Ready) => DerivedStatus::Completed,
        Some(RawStatus::Review) => DerivedStatus::NeedsReview,
        _ => DerivedStatus::Open,
    };

    if is_overdue(record.due_date, today) {
        DerivedStatus::Overdue
    } else {
        settled
    }
}
