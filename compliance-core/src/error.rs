//! Error types for the console core

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::config::Locale;
use crate::messages::{self, MessageKey};
use crate::models::Frequency;

/// Classification of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 401 - handled by navigation, never by a toast
    Unauthenticated,
    Forbidden,
    NotFound,
    /// Any other 4xx
    Client,
    /// 5xx
    Server,
    /// The request never produced a response
    Network,
    /// The response body could not be decoded
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Unauthenticated => write!(f, "not authenticated"),
            ApiErrorKind::Forbidden => write!(f, "forbidden"),
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::Client => write!(f, "request rejected"),
            ApiErrorKind::Server => write!(f, "server error"),
            ApiErrorKind::Network => write!(f, "network error"),
            ApiErrorKind::Decode => write!(f, "invalid response"),
        }
    }
}

/// Error from the compliance service: kind, HTTP status and raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
    /// `detail` from the `{detail?: string}` error body
    pub detail: Option<String>,
    pub payload: Option<Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.detail) {
            (Some(status), Some(detail)) => write!(f, "{} ({}): {}", self.kind, status, detail),
            (Some(status), None) => write!(f, "{} ({})", self.kind, status),
            (None, Some(detail)) => write!(f, "{}: {}", self.kind, detail),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Builds an error from a non-success HTTP response
    pub fn from_response(status: u16, payload: Option<Value>) -> Self {
        let detail = payload
            .as_ref()
            .and_then(|p| p.get("detail"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|d| !d.trim().is_empty());
        Self {
            kind: Self::kind_for_status(status),
            status: Some(status),
            detail,
            payload,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            status: None,
            detail: Some(message.into()),
            payload: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            status: None,
            detail: Some(message.into()),
            payload: None,
        }
    }

    pub fn kind_for_status(status: u16) -> ApiErrorKind {
        match status {
            401 => ApiErrorKind::Unauthenticated,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Client,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.kind == ApiErrorKind::Unauthenticated
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }

    /// Message suitable for a toast: the server's detail when it sent one,
    /// otherwise a generic localised fallback.
    pub fn user_message(&self, locale: Locale) -> String {
        match (&self.detail, self.status) {
            (Some(detail), Some(_)) => detail.clone(),
            _ => messages::text(MessageKey::GenericError, locale).to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Client-side validation failures, raised before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a status must be chosen")]
    MissingStatus,

    #[error("a frequency must be chosen")]
    MissingFrequency,

    #[error("a due date is required for frequency {0}")]
    MissingDueDate(Frequency),

    #[error("interval must be a positive whole number for frequency {0}")]
    InvalidInterval(Frequency),

    #[error("a non-empty reason is required")]
    EmptyReason,

    #[error("no requirements selected")]
    NothingSelected,
}

impl ValidationError {
    pub fn message_key(&self) -> MessageKey {
        match self {
            ValidationError::MissingStatus => MessageKey::StatusRequired,
            ValidationError::MissingFrequency => MessageKey::FrequencyRequired,
            ValidationError::MissingDueDate(_) => MessageKey::DueDateRequired,
            ValidationError::InvalidInterval(_) => MessageKey::IntervalRequired,
            ValidationError::EmptyReason => MessageKey::ReasonRequired,
            ValidationError::NothingSelected => MessageKey::NothingSelected,
        }
    }

    pub fn user_message(&self, locale: Locale) -> &'static str {
        messages::text(self.message_key(), locale)
    }
}

/// Failure of a mutation workflow
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] ApiError),
}
