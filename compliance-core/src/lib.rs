pub mod models;
pub mod config;
pub mod messages;
pub mod error;
pub mod filters;
pub mod status;
pub mod api;
pub mod sync;
pub mod selection;
pub mod host;
pub mod triage;
pub mod workflows;
pub mod controller;
pub mod auth;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use models::{
    AnchorType, ArchiveState, Document, DocumentStatus, Frequency, Profile, RawStatus,
    Requirement, RequirementPage,
};
pub use config::{get_config_path, ConsoleConfig, ConsoleContext, Locale, Preferences, Theme};
pub use error::{ApiError, ApiErrorKind, ApiResult, ValidationError, WorkflowError};
pub use filters::{DueFilter, FilterPatch, FilterState, ListQuery, StatusFilter};
pub use status::{derive_status, Clock, DerivedStatus, SystemClock};
pub use api::{HttpClient, RequirementsApi};
pub use host::{DialogOutcome, Dialogs, Host, Navigator, Notifier, Toast, ToastLevel};
pub use triage::{TriageDraft, TriageForm};
pub use workflows::{MutationOutcome, SkipReason};
pub use controller::{ListController, ListView, PageInfo, PendingFlags, RowView};
pub use auth::{ensure_session, SessionState};
pub use poller::{DocumentPoller, PollStatus, PollerConfig};
pub use sync::Revalidation;
