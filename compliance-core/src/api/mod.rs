//! Remote service contract
//!
//! The console talks to the compliance service through [`RequirementsApi`].
//! [`HttpClient`] is the production implementation; tests substitute their own.

mod client;

pub use client::HttpClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiResult;
use crate::filters::ListQuery;
use crate::models::{AnchorType, Document, Frequency, Profile, RawStatus, Requirement, RequirementPage};

/// Body of `POST /requirements/triage/bulk`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkTriageRequest {
    pub requirement_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_type: Option<AnchorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_value: Option<Value>,
    /// Omitted when `None`; `Some(None)` is sent as `null` and clears the date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RawStatus>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BulkTriageResponse {
    #[serde(default)]
    pub items: Vec<Requirement>,
    #[serde(default)]
    pub updated: u64,
}

/// Operations the console needs from the compliance service.
///
/// Futures are not `Send`: the console runs on a single-threaded runtime.
#[async_trait(?Send)]
pub trait RequirementsApi {
    /// `GET /requirements`
    async fn list_requirements(&self, query: &ListQuery) -> ApiResult<RequirementPage>;

    /// `GET /requirements/{id}`
    async fn get_requirement(&self, id: &str) -> ApiResult<Requirement>;

    /// `POST /requirements/{id}/complete`
    async fn complete_requirement(&self, id: &str, completed_by: &str) -> ApiResult<Requirement>;

    /// `POST /requirements/{id}/archive`
    async fn archive_requirement(&self, id: &str, reason: &str) -> ApiResult<Requirement>;

    /// `POST /requirements/{id}/archive/restore`
    async fn restore_requirement(&self, id: &str) -> ApiResult<Requirement>;

    /// `POST /requirements/triage/bulk`
    async fn bulk_triage(&self, request: &BulkTriageRequest) -> ApiResult<BulkTriageResponse>;

    /// `GET /auth/me`
    async fn current_profile(&self) -> ApiResult<Profile>;

    /// `GET /documents/{id}`
    async fn get_document(&self, id: &str) -> ApiResult<Document>;
}
