//! Triage form model
//!
//! [`TriageDraft`] holds the editable triage fields and turns them into a
//! [`BulkTriageRequest`]. [`TriageForm`] wraps a draft for the single-record
//! view and tracks whether it differs from the last saved state.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::api::BulkTriageRequest;
use crate::config::Locale;
use crate::error::ValidationError;
use crate::host::Dialogs;
use crate::messages::{self, MessageKey};
use crate::models::{AnchorType, Frequency, RawStatus, Requirement};

const ANCHOR_DATE_KEY: &str = "date";
const ANCHOR_INTERVAL_KEY: &str = "interval";

/// Editable triage fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageDraft {
    pub status: Option<RawStatus>,
    pub frequency: Option<Frequency>,
    pub anchor_type: Option<AnchorType>,
    /// Reference date merged into the anchor value
    pub anchor_date: Option<NaiveDate>,
    /// Interval as typed; only used by the "every N" frequencies
    pub interval: String,
    pub due_date: Option<NaiveDate>,
    pub assignee: String,
}

impl TriageDraft {
    /// Draft pre-filled from a stored record
    pub fn from_record(record: &Requirement) -> Self {
        let anchor = record.anchor_value.as_ref().and_then(Value::as_object);
        let anchor_date = anchor
            .and_then(|a| a.get(ANCHOR_DATE_KEY))
            .and_then(Value::as_str)
            .and_then(crate::models::parse_due_date);
        let interval = anchor
            .and_then(|a| a.get(ANCHOR_INTERVAL_KEY))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        Self {
            status: record.status,
            frequency: record.frequency,
            anchor_type: record.anchor_type,
            anchor_date,
            interval,
            due_date: record.due_date,
            assignee: record.assignee().unwrap_or_default().to_string(),
        }
    }

    /// Interval as a positive whole number
    pub fn interval_value(&self) -> Option<u32> {
        self.interval.trim().parse::<u32>().ok().filter(|n| *n > 0)
    }

    /// Checks the fields in order: status, frequency, due date, interval
    pub fn validate(&self) -> Result<(RawStatus, Frequency), ValidationError> {
        let status = self.status.ok_or(ValidationError::MissingStatus)?;
        let frequency = self.frequency.ok_or(ValidationError::MissingFrequency)?;
        if frequency.requires_due_date() && self.due_date.is_none() {
            return Err(ValidationError::MissingDueDate(frequency));
        }
        if frequency.is_interval() && self.interval_value().is_none() {
            return Err(ValidationError::InvalidInterval(frequency));
        }
        Ok((status, frequency))
    }

    /// Anchor value object: the reference date, plus `interval` and the
    /// frequency's unit key for the "every N" kinds. `None` when empty.
    pub fn anchor_value(&self) -> Option<Value> {
        let mut anchor = Map::new();
        if let Some(date) = self.anchor_date {
            anchor.insert(
                ANCHOR_DATE_KEY.to_string(),
                json!(date.format("%Y-%m-%d").to_string()),
            );
        }
        let unit = self.frequency.and_then(|f| f.interval_unit());
        if let (Some(unit), Some(interval)) = (unit, self.interval_value()) {
            anchor.insert(ANCHOR_INTERVAL_KEY.to_string(), json!(interval));
            anchor.insert(unit.to_string(), json!(interval));
        }
        (!anchor.is_empty()).then_some(Value::Object(anchor))
    }

    fn trimmed_assignee(&self) -> Option<String> {
        let assignee = self.assignee.trim();
        (!assignee.is_empty()).then(|| assignee.to_string())
    }

    /// Validated payload for a full triage of `ids`
    pub fn to_request(&self, ids: Vec<String>) -> Result<BulkTriageRequest, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::NothingSelected);
        }
        let (status, frequency) = self.validate()?;
        Ok(BulkTriageRequest {
            requirement_ids: ids,
            frequency: Some(frequency),
            anchor_type: self.anchor_type,
            anchor_value: self.anchor_value(),
            due_date: self.due_date.map(Some),
            assignee: self.trimmed_assignee(),
            status: Some(status),
        })
    }

    /// Payload that only moves status and due date. The due date is always
    /// sent, so an emptied date clears it on the service.
    pub fn to_status_request(&self, ids: Vec<String>) -> Result<BulkTriageRequest, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::NothingSelected);
        }
        let status = self.status.ok_or(ValidationError::MissingStatus)?;
        Ok(BulkTriageRequest {
            requirement_ids: ids,
            frequency: None,
            anchor_type: None,
            anchor_value: None,
            due_date: Some(self.due_date),
            assignee: None,
            status: Some(status),
        })
    }
}

/// Single-record triage editor with dirty tracking
#[derive(Debug, Clone)]
pub struct TriageForm {
    record_id: String,
    triage_mode: bool,
    baseline: TriageDraft,
    pub draft: TriageDraft,
}

impl TriageForm {
    pub fn new(record: &Requirement) -> Self {
        let baseline = TriageDraft::from_record(record);
        Self {
            record_id: record.id.clone(),
            triage_mode: record.is_pending_review(),
            draft: baseline.clone(),
            baseline,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// True while the record awaits triage; the full field set is editable
    pub fn triage_mode(&self) -> bool {
        self.triage_mode
    }

    pub fn baseline(&self) -> &TriageDraft {
        &self.baseline
    }

    pub fn is_dirty(&self) -> bool {
        let (draft, base) = (&self.draft, &self.baseline);
        let status_or_due = draft.status != base.status || draft.due_date != base.due_date;
        if !self.triage_mode {
            return status_or_due;
        }
        status_or_due
            || draft.frequency != base.frequency
            || draft.anchor_type != base.anchor_type
            || draft.anchor_date != base.anchor_date
            || draft.interval.trim() != base.interval.trim()
            || draft.assignee.trim() != base.assignee.trim()
    }

    /// Whether closing the console should be intercepted
    pub fn guards_unload(&self) -> bool {
        self.is_dirty()
    }

    /// Resets the baseline and draft to a saved record
    pub fn resync(&mut self, record: &Requirement) {
        self.baseline = TriageDraft::from_record(record);
        self.draft = self.baseline.clone();
        self.triage_mode = record.is_pending_review();
    }

    /// Takes the current draft as the new baseline
    pub fn mark_saved(&mut self) {
        self.baseline = self.draft.clone();
    }

    pub fn to_request(&self) -> Result<BulkTriageRequest, ValidationError> {
        let ids = vec![self.record_id.clone()];
        if self.triage_mode {
            self.draft.to_request(ids)
        } else {
            self.draft.to_status_request(ids)
        }
    }

    /// Asks before discarding unsaved edits; true when leaving may proceed
    pub async fn confirm_leave<D>(&self, dialogs: &D, locale: Locale) -> bool
    where
        D: Dialogs + ?Sized,
    {
        if !self.is_dirty() {
            return true;
        }
        dialogs
            .confirm(messages::text(MessageKey::UnsavedChanges, locale))
            .await
            .confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DialogOutcome;
    use crate::testing::{date, FakeHost};

    fn complete_draft(frequency: Frequency) -> TriageDraft {
        TriageDraft {
            status: Some(RawStatus::Open),
            frequency: Some(frequency),
            due_date: Some(date(2026, 6, 1)),
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_order() {
        let draft = TriageDraft::default();
        assert_eq!(draft.validate(), Err(ValidationError::MissingStatus));

        let draft = TriageDraft {
            status: Some(RawStatus::Open),
            ..Default::default()
        };
        assert_eq!(draft.validate(), Err(ValidationError::MissingFrequency));

        let draft = TriageDraft {
            due_date: None,
            ..complete_draft(Frequency::EveryNDays)
        };
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingDueDate(Frequency::EveryNDays))
        );
    }

    #[test]
    fn test_due_date_optional_for_one_off_frequencies() {
        for frequency in [Frequency::BeforeEachUse, Frequency::OneTime] {
            let draft = TriageDraft {
                due_date: None,
                ..complete_draft(frequency)
            };
            assert!(draft.validate().is_ok());
        }
    }

    #[test]
    fn test_interval_must_be_positive_integer() {
        for bad in ["", "0", "-2", "1.5", "two"] {
            let draft = TriageDraft {
                interval: bad.to_string(),
                ..complete_draft(Frequency::EveryNMonths)
            };
            assert_eq!(
                draft.validate(),
                Err(ValidationError::InvalidInterval(Frequency::EveryNMonths)),
                "interval {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_every_n_weeks_anchor_value() {
        let mut draft = complete_draft(Frequency::EveryNWeeks);
        assert!(draft.to_request(vec!["a".into()]).is_err());

        draft.interval = " 2 ".to_string();
        draft.anchor_type = Some(AnchorType::Calendar);
        draft.anchor_date = Some(date(2026, 1, 5));
        let request = draft.to_request(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(
            request.anchor_value,
            Some(json!({"date": "2026-01-05", "interval": 2, "weeks": 2}))
        );
        assert_eq!(request.frequency, Some(Frequency::EveryNWeeks));
        assert_eq!(request.requirement_ids.len(), 2);
    }

    #[test]
    fn test_non_interval_frequency_ignores_interval() {
        let draft = TriageDraft {
            interval: "4".to_string(),
            ..complete_draft(Frequency::Monthly)
        };
        assert_eq!(draft.anchor_value(), None);
    }

    #[test]
    fn test_request_trims_assignee_and_requires_ids() {
        let mut draft = complete_draft(Frequency::Annual);
        draft.assignee = "  qa@example.com ".to_string();
        let request = draft.to_request(vec!["a".into()]).unwrap();
        assert_eq!(request.assignee.as_deref(), Some("qa@example.com"));

        draft.assignee = "   ".to_string();
        assert_eq!(draft.to_request(vec!["a".into()]).unwrap().assignee, None);
        assert_eq!(draft.to_request(vec![]), Err(ValidationError::NothingSelected));
    }

    #[test]
    fn test_draft_from_record_reads_anchor() {
        let mut record = Requirement::new("r", "T").with_status(RawStatus::PendingReview);
        record.frequency = Some(Frequency::EveryNDays);
        record.anchor_value = Some(json!({"date": "2026-02-01", "interval": 10, "days": 10}));
        let draft = TriageDraft::from_record(&record);
        assert_eq!(draft.anchor_date, Some(date(2026, 2, 1)));
        assert_eq!(draft.interval, "10");
        assert_eq!(draft.interval_value(), Some(10));
    }

    #[test]
    fn test_dirty_tracking_in_triage_mode() {
        let record = Requirement::new("r", "T").with_status(RawStatus::PendingReview);
        let mut form = TriageForm::new(&record);
        assert!(form.triage_mode());
        assert!(!form.is_dirty());

        form.draft.assignee = "ops".to_string();
        assert!(form.is_dirty());
        assert!(form.guards_unload());

        form.draft.assignee.clear();
        form.draft.interval = " ".to_string();
        assert!(!form.is_dirty());
    }

    #[test]
    fn test_dirty_tracking_outside_triage_mode() {
        let record = Requirement::new("r", "T").with_status(RawStatus::Open);
        let mut form = TriageForm::new(&record);
        assert!(!form.triage_mode());

        form.draft.frequency = Some(Frequency::Weekly);
        assert!(!form.is_dirty());

        form.draft.due_date = Some(date(2026, 9, 9));
        assert!(form.is_dirty());

        form.mark_saved();
        assert!(!form.is_dirty());
    }

    #[test]
    fn test_status_only_request_outside_triage_mode() {
        let record = Requirement::new("r", "T").with_status(RawStatus::Open);
        let mut form = TriageForm::new(&record);
        form.draft.status = Some(RawStatus::Review);
        let request = form.to_request().unwrap();
        assert_eq!(request.status, Some(RawStatus::Review));
        assert_eq!(request.frequency, None);
        assert_eq!(request.requirement_ids, vec!["r".to_string()]);
        assert_eq!(request.due_date, Some(None));
    }

    #[test]
    fn test_cleared_due_date_is_sent_outside_triage_mode() {
        let record = Requirement::new("r", "T")
            .with_status(RawStatus::Open)
            .with_due_date(date(2026, 6, 1));
        let mut form = TriageForm::new(&record);
        form.draft.due_date = None;
        assert!(form.is_dirty());

        let request = form.to_request().unwrap();
        assert_eq!(request.due_date, Some(None));
        assert_eq!(serde_json::to_value(&request).unwrap()["due_date"], Value::Null);
    }

    #[tokio::test]
    async fn test_confirm_leave() {
        let record = Requirement::new("r", "T").with_status(RawStatus::PendingReview);
        let mut form = TriageForm::new(&record);
        let host = FakeHost::new("");

        assert!(form.confirm_leave(&host, Locale::En).await);
        assert!(host.dialogs_shown().is_empty());

        form.draft.status = Some(RawStatus::Open);
        host.answer_confirm(DialogOutcome::cancelled());
        assert!(!form.confirm_leave(&host, Locale::En).await);

        host.answer_confirm(DialogOutcome::confirmed());
        assert!(form.confirm_leave(&host, Locale::Fr).await);
        assert_eq!(host.dialogs_shown().len(), 2);
    }
}
