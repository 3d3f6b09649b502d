//! Requirement data model
//!
//! Types mirrored from the compliance service. The console never owns these
//! records: it keeps a read/optimistic-write copy of the page on screen.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use crate::config::Locale;

/// Raw lifecycle status as stored by the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawStatus {
    Open,
    Review,
    PendingReview,
    Ready,
    Done,
    Archived,
}

impl RawStatus {
    pub const ALL: [RawStatus; 6] = [
        RawStatus::Open,
        RawStatus::Review,
        RawStatus::PendingReview,
        RawStatus::Ready,
        RawStatus::Done,
        RawStatus::Archived,
    ];

    /// Wire token, e.g. `PENDING_REVIEW`
    pub fn as_token(&self) -> &'static str {
        match self {
            RawStatus::Open => "OPEN",
            RawStatus::Review => "REVIEW",
            RawStatus::PendingReview => "PENDING_REVIEW",
            RawStatus::Ready => "READY",
            RawStatus::Done => "DONE",
            RawStatus::Archived => "ARCHIVED",
        }
    }

    /// Parse a wire token (case-insensitive, `-` accepted for `_`)
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|s| s.as_token() == normalized)
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Recurrence of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    BeforeEachUse,
    OneTime,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    EveryNDays,
    EveryNWeeks,
    EveryNMonths,
}

impl Frequency {
    pub const ALL: [Frequency; 11] = [
        Frequency::BeforeEachUse,
        Frequency::OneTime,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::SemiAnnual,
        Frequency::Annual,
        Frequency::EveryNDays,
        Frequency::EveryNWeeks,
        Frequency::EveryNMonths,
    ];

    pub fn as_token(&self) -> &'static str {
        match self {
            Frequency::BeforeEachUse => "BEFORE_EACH_USE",
            Frequency::OneTime => "ONE_TIME",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Quarterly => "QUARTERLY",
            Frequency::SemiAnnual => "SEMI_ANNUAL",
            Frequency::Annual => "ANNUAL",
            Frequency::EveryNDays => "EVERY_N_DAYS",
            Frequency::EveryNWeeks => "EVERY_N_WEEKS",
            Frequency::EveryNMonths => "EVERY_N_MONTHS",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|f| f.as_token() == normalized)
    }

    /// Anchor value key carrying the interval for the "every N ..." kinds
    pub fn interval_unit(&self) -> Option<&'static str> {
        match self {
            Frequency::EveryNDays => Some("days"),
            Frequency::EveryNWeeks => Some("weeks"),
            Frequency::EveryNMonths => Some("months"),
            _ => None,
        }
    }

    pub fn is_interval(&self) -> bool {
        self.interval_unit().is_some()
    }

    /// Whether a triage save must carry a due date
    pub fn requires_due_date(&self) -> bool {
        !matches!(self, Frequency::BeforeEachUse | Frequency::OneTime)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::BeforeEachUse => "Before each use",
            Frequency::OneTime => "One time",
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Quarterly => "Quarterly",
            Frequency::SemiAnnual => "Semi-annual",
            Frequency::Annual => "Annual",
            Frequency::EveryNDays => "Every N days",
            Frequency::EveryNWeeks => "Every N weeks",
            Frequency::EveryNMonths => "Every N months",
        };
        write!(f, "{}", label)
    }
}

/// Reference point a recurring due date is computed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorType {
    UploadDate,
    IssueDate,
    Calendar,
    FirstCompletion,
    CustomDate,
}

impl AnchorType {
    pub const ALL: [AnchorType; 5] = [
        AnchorType::UploadDate,
        AnchorType::IssueDate,
        AnchorType::Calendar,
        AnchorType::FirstCompletion,
        AnchorType::CustomDate,
    ];

    pub fn as_token(&self) -> &'static str {
        match self {
            AnchorType::UploadDate => "UPLOAD_DATE",
            AnchorType::IssueDate => "ISSUE_DATE",
            AnchorType::Calendar => "CALENDAR",
            AnchorType::FirstCompletion => "FIRST_COMPLETION",
            AnchorType::CustomDate => "CUSTOM_DATE",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|a| a.as_token() == normalized)
    }
}

impl fmt::Display for AnchorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// Archive lifecycle, orthogonal to the raw status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveState {
    Active,
    Pending,
    Archived,
    Restored,
    Deleted,
}

impl ArchiveState {
    pub const ALL: [ArchiveState; 5] = [
        ArchiveState::Active,
        ArchiveState::Pending,
        ArchiveState::Archived,
        ArchiveState::Restored,
        ArchiveState::Deleted,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.to_string() == normalized)
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveState::Active => write!(f, "active"),
            ArchiveState::Pending => write!(f, "pending"),
            ArchiveState::Archived => write!(f, "archived"),
            ArchiveState::Restored => write!(f, "restored"),
            ArchiveState::Deleted => write!(f, "deleted"),
        }
    }
}

/// Text carried in both console locales
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalizedText {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub fr: String,
}

impl LocalizedText {
    /// Text for `locale`, falling back to the other locale when empty
    pub fn get(&self, locale: Locale) -> &str {
        let (primary, secondary) = match locale {
            Locale::En => (&self.en, &self.fr),
            Locale::Fr => (&self.fr, &self.en),
        };
        if primary.trim().is_empty() {
            secondary
        } else {
            primary
        }
    }
}

/// `attributes.archive`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArchiveAttributes {
    #[serde(
        default,
        deserialize_with = "deserialize_archive_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<ArchiveState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
}

/// `attributes.triage`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriageAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Free-form attribute bag with the sub-records the console understands
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequirementAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage: Option<TriageAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveAttributes>,
    /// Keys the console does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Archive metadata resolved from root fields and `attributes.archive`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveMetadata {
    pub state: Option<ArchiveState>,
    pub reason: Option<String>,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

/// A compliance obligation record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    /// Server-assigned identifier
    pub id: String,

    #[serde(default)]
    pub title: LocalizedText,

    #[serde(default)]
    pub description: LocalizedText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_frequency",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<Frequency>,

    #[serde(
        default,
        deserialize_with = "deserialize_anchor_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub anchor_type: Option<AnchorType>,

    /// Interpreted per anchor type and frequency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_value: Option<Value>,

    /// Raw status; `None` (also for tokens this console does not know) is
    /// treated like OPEN
    #[serde(
        default,
        deserialize_with = "deserialize_raw_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<RawStatus>,

    #[serde(
        default,
        deserialize_with = "deserialize_due_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,

    #[serde(
        default,
        deserialize_with = "deserialize_archive_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub archive_state: Option<ArchiveState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_requested_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_requested_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default)]
    pub attributes: RequirementAttributes,
}

impl Requirement {
    /// Creates a bare OPEN requirement with an English title
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: LocalizedText {
                en: title.into(),
                fr: String::new(),
            },
            description: LocalizedText::default(),
            category: None,
            frequency: None,
            anchor_type: None,
            anchor_value: None,
            status: Some(RawStatus::Open),
            due_date: None,
            archive_state: None,
            archive_reason: None,
            archive_requested_by: None,
            archive_requested_at: None,
            assignee: None,
            attributes: RequirementAttributes::default(),
        }
    }

    pub fn with_status(mut self, status: RawStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_archive_state(mut self, state: ArchiveState) -> Self {
        self.archive_state = Some(state);
        self
    }

    pub fn is_pending_review(&self) -> bool {
        self.status == Some(RawStatus::PendingReview)
    }

    /// Archive metadata, root-level fields taking precedence over nested ones
    pub fn archive_metadata(&self) -> ArchiveMetadata {
        let nested = self.attributes.archive.clone().unwrap_or_default();
        ArchiveMetadata {
            state: self.archive_state.or(nested.state),
            reason: self.archive_reason.clone().or(nested.reason),
            requested_by: self.archive_requested_by.clone().or(nested.requested_by),
            requested_at: self.archive_requested_at.or(nested.requested_at),
        }
    }

    /// Archived by either path, or deleted
    pub fn is_archived(&self) -> bool {
        matches!(
            self.archive_metadata().state,
            Some(ArchiveState::Archived) | Some(ArchiveState::Deleted)
        ) || self.status == Some(RawStatus::Archived)
    }

    /// Restore is offered only for an explicit "archived" archive state
    pub fn is_restorable(&self) -> bool {
        self.archive_metadata().state == Some(ArchiveState::Archived)
    }

    /// Assignee, root-level field before `attributes.triage.assignee`
    pub fn assignee(&self) -> Option<&str> {
        self.assignee
            .as_deref()
            .or_else(|| {
                self.attributes
                    .triage
                    .as_ref()
                    .and_then(|t| t.assignee.as_deref())
            })
            .filter(|a| !a.trim().is_empty())
    }

    pub fn triage_reasons(&self) -> &[String] {
        self.attributes
            .triage
            .as_ref()
            .map(|t| t.reasons.as_slice())
            .unwrap_or(&[])
    }

    pub fn title_for(&self, locale: Locale) -> &str {
        self.title.get(locale)
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (normalised to its UTC
/// date). Anything else is logged and read as no due date, so one bad row
/// cannot fail a whole page.
fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_field(deserializer, "due_date", parse_due_date)
}

fn deserialize_raw_status<'de, D>(deserializer: D) -> Result<Option<RawStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_field(deserializer, "status", RawStatus::from_token)
}

fn deserialize_frequency<'de, D>(deserializer: D) -> Result<Option<Frequency>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_field(deserializer, "frequency", Frequency::from_token)
}

fn deserialize_anchor_type<'de, D>(deserializer: D) -> Result<Option<AnchorType>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_field(deserializer, "anchor_type", AnchorType::from_token)
}

fn deserialize_archive_state<'de, D>(deserializer: D) -> Result<Option<ArchiveState>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_field(deserializer, "archive_state", ArchiveState::from_token)
}

/// Reads an optional string field through `parse`; values that are not
/// strings or do not parse become `None`
fn lenient_field<'de, D, T>(
    deserializer: D,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let parsed = value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| parse(s));
    if parsed.is_none() && value.as_str().map_or(true, |s| !s.trim().is_empty()) {
        warn!("Ignoring unrecognised {} value {}", field, value);
    }
    Ok(parsed)
}

/// Parse a due date the way the service may send it
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Server-reported pagination for a list response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// One page of the requirement list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementPage {
    pub items: Vec<Requirement>,
    pub pagination: Pagination,
}

/// The signed-in user, from `/auth/me`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Profile {
    /// Identity sent as the completion actor
    pub fn actor(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// Processing state of an uploaded document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Ready => write!(f, "ready"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An uploaded source document awaiting requirement extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}
