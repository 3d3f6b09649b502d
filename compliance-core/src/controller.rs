//! Requirement list controller
//!
//! Composition root of the console. It reconciles four independently changing
//! sources of state:
//!
//! - the navigation query (decoded through [`crate::filters`])
//! - the revalidating remote cache and the mirror ([`DataSync`])
//! - confirmed mutation results, upserted into the mirror
//! - the bulk triage [`Selection`]
//!
//! and derives the presentation status of every visible row. All state lives
//! in cells owned by the controller and is never borrowed across an await.

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::RequirementsApi;
use crate::config::{ConsoleConfig, ConsoleContext, Locale};
use crate::error::{ApiError, ApiResult, ValidationError};
use crate::filters::{
    clamp_page, decode, encode, page_count, toggle_status, DueFilter, FilterPatch, FilterState,
    ListQuery, StatusFilter,
};
use crate::host::{Host, Toast};
use crate::messages::{self, MessageKey};
use crate::models::{Requirement, RequirementPage};
use crate::selection::{SelectAllState, Selection};
use crate::status::{days_until, derive_status, Clock, DerivedStatus, SystemClock};
use crate::sync::{DataSync, Revalidation};

/// In-flight mutation markers; they disable affordances, they are not locks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFlags {
    pub completing: Option<String>,
    pub archiving: Option<String>,
    pub restoring: Option<String>,
    pub dismissing: BTreeSet<String>,
    pub saving_triage: bool,
}

impl PendingFlags {
    pub fn is_busy(&self, id: &str) -> bool {
        self.completing.as_deref() == Some(id)
            || self.archiving.as_deref() == Some(id)
            || self.restoring.as_deref() == Some(id)
            || self.dismissing.contains(id)
    }
}

/// One table row ready for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub record: Requirement,
    pub derived: DerivedStatus,
    pub selectable: bool,
    pub selected: bool,
    pub days_until_due: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Requested page clamped into `[1, page_count]`
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub page_count: u32,
}

impl PageInfo {
    pub fn new(requested: u32, total: u64, page_size: u32) -> Self {
        Self {
            page: clamp_page(requested, total, page_size),
            page_size,
            total,
            page_count: page_count(total, page_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionView {
    pub ids: Vec<String>,
    pub header: SelectAllState,
}

/// Everything a front end needs to draw the list
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub rows: Vec<RowView>,
    pub pagination: PageInfo,
    pub selection: SelectionView,
    pub pending: PendingFlags,
    pub filters: FilterState,
    pub is_loading: bool,
    pub is_validating: bool,
    pub error: Option<ApiError>,
}

pub struct ListController<A, H> {
    api: A,
    host: H,
    context: Rc<ConsoleContext>,
    clock: Box<dyn Clock>,
    page_size: u32,
    pub(crate) sync: DataSync,
    pub(crate) selection: RefCell<Selection>,
    pub(crate) pending: RefCell<PendingFlags>,
    profile_actor: RefCell<Option<String>>,
}

impl<A, H> ListController<A, H>
where
    A: RequirementsApi,
    H: Host,
{
    pub fn new(api: A, host: H, context: Rc<ConsoleContext>, config: &ConsoleConfig) -> Self {
        let page_size = config.effective_page_size();
        let filters = decode(&host.current_query());
        let sync = DataSync::new(
            ListQuery::from_filters(&filters, page_size),
            config.revalidate_interval(),
        );
        Self {
            api,
            host,
            context,
            clock: Box::new(SystemClock),
            page_size,
            sync,
            selection: RefCell::new(Selection::new()),
            pending: RefCell::new(PendingFlags::default()),
            profile_actor: RefCell::new(None),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Server-rendered page shown until the first response arrives
    pub fn with_seed(self, page: RequirementPage) -> Self {
        self.sync.seed(page);
        self.reconcile_selection();
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn context(&self) -> &ConsoleContext {
        &self.context
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(crate) fn locale(&self) -> Locale {
        self.context.locale()
    }

    /// Filters decoded from the current navigation query
    pub fn filters(&self) -> FilterState {
        decode(&self.host.current_query())
    }

    /// List query the data layer is currently bound to
    pub fn active_query(&self) -> ListQuery {
        self.sync.active_key()
    }

    pub fn rows(&self) -> Vec<Requirement> {
        self.sync.rows()
    }

    pub fn derived_status(&self, record: &Requirement) -> DerivedStatus {
        derive_status(record, self.today())
    }

    pub fn pending(&self) -> PendingFlags {
        self.pending.borrow().clone()
    }

    pub fn view(&self) -> ListView {
        let filters = self.filters();
        let today = self.today();
        let rows = self.sync.rows();
        let snapshot = self.sync.snapshot();
        let selection = self.selection.borrow();

        let total = snapshot
            .data
            .as_ref()
            .map_or(rows.len() as u64, |page| page.pagination.total);
        let row_views = rows
            .iter()
            .map(|record| RowView {
                derived: derive_status(record, today),
                selectable: record.is_pending_review(),
                selected: selection.contains(&record.id),
                days_until_due: record.due_date.map(|due| days_until(due, today)),
                record: record.clone(),
            })
            .collect();

        ListView {
            rows: row_views,
            pagination: PageInfo::new(filters.page, total, self.page_size),
            selection: SelectionView {
                ids: selection.ids(),
                header: selection.header_state(&rows),
            },
            pending: self.pending.borrow().clone(),
            filters,
            is_loading: snapshot.is_loading,
            is_validating: snapshot.is_validating,
            error: snapshot.error,
        }
    }

    /// Rebinds the data layer to the navigation query. Returns true when the
    /// list query changed; the selection does not survive a change.
    pub fn sync_with_navigation(&self) -> bool {
        let key = ListQuery::from_filters(&self.filters(), self.page_size);
        let changed = self.sync.activate(key);
        if changed {
            debug!("List query is now {}", self.sync.active_key());
            self.selection.borrow_mut().clear();
        }
        changed
    }

    /// Binds to the navigation query and fetches it
    pub async fn load(&self) -> Revalidation {
        self.sync_with_navigation();
        self.revalidate().await
    }

    pub async fn revalidate(&self) -> Revalidation {
        let outcome = self.sync.revalidate(&self.api).await;
        match &outcome {
            Revalidation::Replaced => self.reconcile_selection(),
            Revalidation::Failed(err) => self.surface_error(err),
            Revalidation::Stale | Revalidation::Discarded => {}
        }
        outcome
    }

    /// Background revalidation, if the interval has elapsed
    pub async fn tick(&self) -> Option<Revalidation> {
        if !self.sync.is_alive() || !self.sync.is_due(Instant::now()) {
            return None;
        }
        Some(self.revalidate().await)
    }

    /// Commits a filter change to the navigation query and fetches the new
    /// list. A filter change without an explicit page goes back to page 1.
    pub async fn set_filters(&self, mut patch: FilterPatch) -> Option<Revalidation> {
        if patch.touches_filters() && patch.page.is_none() {
            patch.page = Some(1);
        }
        let query = encode(&self.host.current_query(), &patch);
        self.host.replace_query(&query);
        if !self.sync_with_navigation() {
            return None;
        }
        Some(self.revalidate().await)
    }

    pub async fn set_page(&self, page: u32) -> Option<Revalidation> {
        self.set_filters(FilterPatch::page(page.max(1))).await
    }

    pub async fn toggle_status_filter(&self, bucket: StatusFilter, on: bool) -> Option<Revalidation> {
        let status = toggle_status(&self.filters().status, bucket, on);
        self.set_filters(FilterPatch {
            status: Some(status),
            ..Default::default()
        })
        .await
    }

    pub async fn toggle_due_filter(&self, due: DueFilter, on: bool) -> Option<Revalidation> {
        let mut current = self.filters().due;
        if on {
            current.insert(due);
        } else {
            current.remove(&due);
        }
        self.set_filters(FilterPatch {
            due: Some(current),
            ..Default::default()
        })
        .await
    }

    pub fn toggle_selection(&self, id: &str, checked: bool) -> bool {
        let rows = self.sync.rows();
        self.selection.borrow_mut().toggle(id, checked, &rows)
    }

    pub fn toggle_all(&self, checked: bool) {
        let rows = self.sync.rows();
        self.selection.borrow_mut().toggle_all(checked, &rows);
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.borrow().ids()
    }

    pub fn select_all_state(&self) -> SelectAllState {
        let rows = self.sync.rows();
        self.selection.borrow().header_state(&rows)
    }

    /// Tears the controller down; late responses are dropped
    pub fn unmount(&self) {
        debug!("List controller unmounted");
        self.sync.unmount();
    }

    pub fn is_mounted(&self) -> bool {
        self.sync.is_alive()
    }

    /// Keeps the selection inside the selectable rows of the mirror
    pub(crate) fn reconcile_selection(&self) {
        let rows = self.sync.rows();
        let mut selection = self.selection.borrow_mut();
        selection.retain_valid(&rows);
        let has_selectable = rows.iter().any(Requirement::is_pending_review);
        if !self.filters().triage_active() && !has_selectable {
            selection.clear();
        }
    }

    /// Upserts a confirmed row and reconciles the selection
    pub(crate) fn apply_row(&self, row: Requirement) {
        if self.sync.upsert(row) {
            self.reconcile_selection();
        }
    }

    /// Routes a remote failure: 401 goes to login, anything else is a toast
    pub(crate) fn surface_error(&self, err: &ApiError) {
        if !self.sync.is_alive() {
            return;
        }
        if err.is_unauthenticated() {
            info!("Session expired, redirecting to login");
            self.host.redirect_to_login();
            return;
        }
        self.host.notify(Toast::error(err.user_message(self.locale())));
    }

    pub(crate) fn surface_validation(&self, err: &ValidationError) {
        if self.sync.is_alive() {
            self.host.notify(Toast::error(err.user_message(self.locale())));
        }
    }

    pub(crate) fn notify_success(&self, key: MessageKey) {
        if self.sync.is_alive() {
            self.host
                .notify(Toast::success(messages::text(key, self.locale())));
        }
    }

    /// Record from the mirror, or from the service when it is not on screen
    pub async fn record(&self, id: &str) -> ApiResult<Requirement> {
        if let Some(row) = self.sync.find(id) {
            return Ok(row);
        }
        self.api.get_requirement(id).await
    }

    /// Identity sent as the completion actor: the signed-in profile, or the
    /// configured actor when the profile cannot be fetched
    pub(crate) async fn acting_user(&self) -> ApiResult<String> {
        let cached = self.profile_actor.borrow().clone();
        if let Some(actor) = cached {
            return Ok(actor);
        }
        match self.api.current_profile().await {
            Ok(profile) => {
                let actor = profile.actor().to_string();
                *self.profile_actor.borrow_mut() = Some(actor.clone());
                Ok(actor)
            }
            Err(err) if err.is_unauthenticated() => Err(err),
            Err(err) => {
                debug!("Profile unavailable ({}), using configured actor", err);
                self.context.actor().ok_or(err)
            }
        }
    }
}
