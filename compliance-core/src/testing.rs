//! In-memory service and front end shared by the unit tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tokio::sync::Notify;

use crate::api::{BulkTriageRequest, BulkTriageResponse, RequirementsApi};
use crate::error::{ApiError, ApiResult};
use crate::filters::ListQuery;
use crate::host::{DialogOutcome, Dialogs, Navigator, Notifier, Toast};
use crate::models::{
    ArchiveState, Document, Pagination, Profile, RawStatus, Requirement, RequirementPage,
};

pub(crate) const SERVER_ACTOR: &str = "archiver@example.com";

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn triage_row(id: &str) -> Requirement {
    Requirement::new(id, format!("Requirement {}", id)).with_status(RawStatus::PendingReview)
}

pub(crate) fn open_row(id: &str) -> Requirement {
    Requirement::new(id, format!("Requirement {}", id))
}

pub(crate) fn page_of(items: Vec<Requirement>, total: u64) -> RequirementPage {
    RequirementPage {
        items,
        pagination: Pagination {
            page: 1,
            limit: 10,
            total,
        },
    }
}

/// Stateful stand-in for the compliance service
pub(crate) struct FakeApi {
    rows: RefCell<Vec<Requirement>>,
    list_failures: RefCell<VecDeque<ApiError>>,
    failures: RefCell<HashMap<String, ApiError>>,
    held_pages: RefCell<HashMap<u32, Rc<Notify>>>,
    calls: RefCell<Vec<String>>,
    profile: RefCell<ApiResult<Profile>>,
    documents: RefCell<VecDeque<ApiResult<Document>>>,
}

impl FakeApi {
    pub(crate) fn with_rows(rows: Vec<Requirement>) -> Self {
        Self {
            rows: RefCell::new(rows),
            list_failures: RefCell::new(VecDeque::new()),
            failures: RefCell::new(HashMap::new()),
            held_pages: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            profile: RefCell::new(Ok(Profile {
                id: "user-1".to_string(),
                email: Some("auditor@example.com".to_string()),
                name: None,
            })),
            documents: RefCell::new(VecDeque::new()),
        }
    }

    pub(crate) fn fail_next_list(&self, error: ApiError) {
        self.list_failures.borrow_mut().push_back(error);
    }

    /// Makes the next `op` call for `id` fail (`op`: complete, archive, restore, get, bulk)
    pub(crate) fn fail(&self, op: &str, id: &str, error: ApiError) {
        self.failures
            .borrow_mut()
            .insert(format!("{}:{}", op, id), error);
    }

    /// Holds the next list call for `page` until the returned handle is notified
    pub(crate) fn hold_list_page(&self, page: u32) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.held_pages.borrow_mut().insert(page, gate.clone());
        gate
    }

    pub(crate) fn set_profile(&self, profile: ApiResult<Profile>) {
        *self.profile.borrow_mut() = profile;
    }

    pub(crate) fn push_document(&self, document: ApiResult<Document>) {
        self.documents.borrow_mut().push_back(document);
    }

    /// Server-side change that did not go through the console
    pub(crate) fn replace_row(&self, row: Requirement) {
        let mut rows = self.rows.borrow_mut();
        match rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    pub(crate) fn row(&self, id: &str) -> Option<Requirement> {
        self.rows.borrow().iter().find(|r| r.id == id).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn calls_to(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn take_failure(&self, op: &str, id: &str) -> ApiResult<()> {
        match self.failures.borrow_mut().remove(&format!("{}:{}", op, id)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn update<F>(&self, id: &str, apply: F) -> ApiResult<Requirement>
    where
        F: FnOnce(&mut Requirement),
    {
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::from_response(404, None))?;
        apply(row);
        Ok(row.clone())
    }
}

#[async_trait(?Send)]
impl RequirementsApi for FakeApi {
    async fn list_requirements(&self, query: &ListQuery) -> ApiResult<RequirementPage> {
        self.record(format!("list:page={}", query.page));
        let gate = self.held_pages.borrow_mut().remove(&query.page);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self.list_failures.borrow_mut().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let matching: Vec<Requirement> = self
            .rows
            .borrow()
            .iter()
            .filter(|r| {
                if query.archived {
                    r.is_archived()
                } else {
                    !r.is_archived()
                        && (query.status.is_empty()
                            || query.status.contains(&r.status.unwrap_or(RawStatus::Open)))
                }
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let start = (query.page.saturating_sub(1) * query.limit) as usize;
        let items = matching
            .into_iter()
            .skip(start)
            .take(query.limit as usize)
            .collect();
        Ok(RequirementPage {
            items,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total,
            },
        })
    }

    async fn get_requirement(&self, id: &str) -> ApiResult<Requirement> {
        self.record(format!("get:{}", id));
        self.take_failure("get", id)?;
        self.row(id)
            .ok_or_else(|| ApiError::from_response(404, None))
    }

    async fn complete_requirement(&self, id: &str, completed_by: &str) -> ApiResult<Requirement> {
        self.record(format!("complete:{}:{}", id, completed_by));
        self.take_failure("complete", id)?;
        self.update(id, |row| row.status = Some(RawStatus::Done))
    }

    async fn archive_requirement(&self, id: &str, reason: &str) -> ApiResult<Requirement> {
        self.record(format!("archive:{}:{}", id, reason));
        self.take_failure("archive", id)?;
        let mut response = self.update(id, |row| {
            row.archive_state = Some(ArchiveState::Archived);
            row.archive_reason = Some(reason.to_string());
            row.archive_requested_by = Some(SERVER_ACTOR.to_string());
        })?;
        // The mutation response omits server-computed metadata
        response.archive_requested_by = None;
        Ok(response)
    }

    async fn restore_requirement(&self, id: &str) -> ApiResult<Requirement> {
        self.record(format!("restore:{}", id));
        self.take_failure("restore", id)?;
        self.update(id, |row| {
            row.archive_state = Some(ArchiveState::Restored);
            row.archive_reason = None;
        })
    }

    async fn bulk_triage(&self, request: &BulkTriageRequest) -> ApiResult<BulkTriageResponse> {
        self.record(format!("bulk:{}", request.requirement_ids.join(",")));
        for id in &request.requirement_ids {
            self.take_failure("bulk", id)?;
        }
        let mut items = Vec::new();
        for id in &request.requirement_ids {
            let row = self.update(id, |row| {
                if request.status.is_some() {
                    row.status = request.status;
                }
                if request.frequency.is_some() {
                    row.frequency = request.frequency;
                }
                if request.anchor_type.is_some() {
                    row.anchor_type = request.anchor_type;
                }
                if request.anchor_value.is_some() {
                    row.anchor_value = request.anchor_value.clone();
                }
                if let Some(due_date) = request.due_date {
                    row.due_date = due_date;
                }
                if request.assignee.is_some() {
                    row.assignee = request.assignee.clone();
                }
            })?;
            items.push(row);
        }
        Ok(BulkTriageResponse {
            updated: items.len() as u64,
            items,
        })
    }

    async fn current_profile(&self) -> ApiResult<Profile> {
        self.record("me:".to_string());
        self.profile.borrow().clone()
    }

    async fn get_document(&self, id: &str) -> ApiResult<Document> {
        self.record(format!("document:{}", id));
        let next = self.documents.borrow_mut().pop_front();
        next.unwrap_or_else(|| Err(ApiError::from_response(404, None)))
    }
}

/// Scripted dialogs plus recorded navigation and toasts
pub(crate) struct FakeHost {
    query: RefCell<String>,
    toasts: RefCell<Vec<Toast>>,
    redirects: Cell<u32>,
    confirms: RefCell<VecDeque<DialogOutcome>>,
    prompts: RefCell<VecDeque<DialogOutcome>>,
    shown: RefCell<Vec<String>>,
}

impl FakeHost {
    pub(crate) fn new(query: &str) -> Self {
        Self {
            query: RefCell::new(query.to_string()),
            toasts: RefCell::new(Vec::new()),
            redirects: Cell::new(0),
            confirms: RefCell::new(VecDeque::new()),
            prompts: RefCell::new(VecDeque::new()),
            shown: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn answer_confirm(&self, outcome: DialogOutcome) {
        self.confirms.borrow_mut().push_back(outcome);
    }

    pub(crate) fn answer_prompt(&self, outcome: DialogOutcome) {
        self.prompts.borrow_mut().push_back(outcome);
    }

    pub(crate) fn toasts(&self) -> Vec<Toast> {
        self.toasts.borrow().clone()
    }

    pub(crate) fn redirects(&self) -> u32 {
        self.redirects.get()
    }

    pub(crate) fn dialogs_shown(&self) -> Vec<String> {
        self.shown.borrow().clone()
    }

    pub(crate) fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Navigation that happened outside the controller
    pub(crate) fn navigate(&self, query: &str) {
        *self.query.borrow_mut() = query.to_string();
    }
}

#[async_trait(?Send)]
impl Dialogs for FakeHost {
    async fn confirm(&self, message: &str) -> DialogOutcome {
        self.shown.borrow_mut().push(message.to_string());
        self.confirms.borrow_mut().pop_front().unwrap_or_default()
    }

    async fn prompt(&self, message: &str) -> DialogOutcome {
        self.shown.borrow_mut().push(message.to_string());
        self.prompts.borrow_mut().pop_front().unwrap_or_default()
    }
}

impl Navigator for FakeHost {
    fn current_query(&self) -> String {
        self.query.borrow().clone()
    }

    fn replace_query(&self, query: &str) {
        *self.query.borrow_mut() = query.to_string();
    }

    fn redirect_to_login(&self) {
        self.redirects.set(self.redirects.get() + 1);
    }
}

impl Notifier for FakeHost {
    fn notify(&self, toast: Toast) {
        self.toasts.borrow_mut().push(toast);
    }
}
