//! Data synchronization layer
//!
//! Two pieces cooperate here:
//!
//! - [`RemoteCache`] remembers the last response (or error) per list query and
//!   decides when a background revalidation is due.
//! - [`Mirror`] is the page of rows the console actually shows. It is replaced
//!   wholesale when a fetch for the active query succeeds and patched one row
//!   at a time after a mutation succeeds, so the table reflects the latest
//!   known state before the cache catches up.
//!
//! [`DataSync`] owns both and is the only writer of the mirror.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::RequirementsApi;
use crate::error::{ApiError, ApiResult};
use crate::filters::ListQuery;
use crate::models::{Requirement, RequirementPage};

/// Cached state for one list query
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub data: Option<RequirementPage>,
    pub error: Option<ApiError>,
    /// A fetch is in flight and there is nothing to show yet
    pub is_loading: bool,
    /// A fetch is in flight
    pub is_validating: bool,
    /// Last successful response
    pub fetched_at: Option<Instant>,
    /// Last settled fetch, successful or not
    attempted_at: Option<Instant>,
    in_flight: usize,
}

#[derive(Debug)]
pub struct RemoteCache {
    entries: HashMap<ListQuery, CacheEntry>,
    revalidate_interval: Option<Duration>,
}

impl RemoteCache {
    pub fn new(revalidate_interval: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            revalidate_interval,
        }
    }

    /// Bootstrap data shown until the first response for `key` arrives
    pub fn seed(&mut self, key: ListQuery, page: RequirementPage) {
        let entry = self.entries.entry(key).or_default();
        if entry.data.is_none() {
            entry.data = Some(page);
        }
    }

    pub fn get(&self, key: &ListQuery) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn begin_fetch(&mut self, key: &ListQuery) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.in_flight += 1;
        entry.is_validating = true;
        entry.is_loading = entry.data.is_none();
    }

    /// Records a settled fetch. The last fetch to settle wins; a failure keeps
    /// the previous data and only records the error.
    pub fn settle(&mut self, key: &ListQuery, result: &ApiResult<RequirementPage>, now: Instant) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.in_flight = entry.in_flight.saturating_sub(1);
        entry.attempted_at = Some(now);
        match result {
            Ok(page) => {
                entry.data = Some(page.clone());
                entry.error = None;
                entry.fetched_at = Some(now);
            }
            Err(err) => entry.error = Some(err.clone()),
        }
        entry.is_validating = entry.in_flight > 0;
        entry.is_loading = entry.is_validating && entry.data.is_none();
    }

    /// Whether the background interval calls for another fetch of `key`
    pub fn is_due_for_revalidation(&self, key: &ListQuery, now: Instant) -> bool {
        let Some(interval) = self.revalidate_interval else {
            return false;
        };
        match self.entries.get(key) {
            None => true,
            Some(entry) if entry.in_flight > 0 => false,
            Some(entry) => entry
                .attempted_at
                .map_or(true, |at| now.saturating_duration_since(at) >= interval),
        }
    }
}

/// Rows of the page currently on screen
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    rows: Vec<Requirement>,
}

impl Mirror {
    pub fn rows(&self) -> &[Requirement] {
        &self.rows
    }

    pub fn get(&self, id: &str) -> Option<&Requirement> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn replace_all(&mut self, rows: Vec<Requirement>) {
        self.rows = rows;
    }

    /// Replaces the row with the same id in place, or appends it
    fn upsert(&mut self, row: Requirement) {
        match self.rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}

/// How a revalidation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Revalidation {
    /// The mirror now holds the fresh page
    Replaced,
    /// The response belonged to a query that is no longer active
    Stale,
    /// The fetch failed; stale rows stay visible
    Failed(ApiError),
    /// The owner was torn down before the response arrived
    Discarded,
}

/// Remote cache plus mirror for one list controller
#[derive(Debug)]
pub struct DataSync {
    cache: RefCell<RemoteCache>,
    mirror: RefCell<Mirror>,
    active: RefCell<ListQuery>,
    alive: Cell<bool>,
}

impl DataSync {
    pub fn new(active: ListQuery, revalidate_interval: Option<Duration>) -> Self {
        Self {
            cache: RefCell::new(RemoteCache::new(revalidate_interval)),
            mirror: RefCell::new(Mirror::default()),
            active: RefCell::new(active),
            alive: Cell::new(true),
        }
    }

    /// Seeds the active query with server-rendered data
    pub fn seed(&self, page: RequirementPage) {
        let key = self.active_key();
        if self.mirror.borrow().is_empty() {
            self.mirror.borrow_mut().replace_all(page.items.clone());
        }
        self.cache.borrow_mut().seed(key, page);
    }

    pub fn active_key(&self) -> ListQuery {
        self.active.borrow().clone()
    }

    /// Switches the active query. The mirror is cleared and refilled from any
    /// cached page for the new query. Returns false if nothing changed.
    pub fn activate(&self, key: ListQuery) -> bool {
        if *self.active.borrow() == key {
            return false;
        }
        let cached = self
            .cache
            .borrow()
            .get(&key)
            .and_then(|entry| entry.data.as_ref())
            .map(|page| page.items.clone());
        {
            let mut mirror = self.mirror.borrow_mut();
            mirror.clear();
            if let Some(rows) = cached {
                mirror.replace_all(rows);
            }
        }
        *self.active.borrow_mut() = key;
        true
    }

    /// Cache state of the active query
    pub fn snapshot(&self) -> CacheEntry {
        let key = self.active_key();
        self.cache.borrow().get(&key).cloned().unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<Requirement> {
        self.mirror.borrow().rows().to_vec()
    }

    pub fn find(&self, id: &str) -> Option<Requirement> {
        self.mirror.borrow().get(id).cloned()
    }

    pub fn mirror_len(&self) -> usize {
        self.mirror.borrow().len()
    }

    /// Applies a confirmed mutation result. Ignored once unmounted.
    pub fn upsert(&self, row: Requirement) -> bool {
        if !self.alive.get() {
            return false;
        }
        self.mirror.borrow_mut().upsert(row);
        true
    }

    /// Fetches the active query and, if it is still active when the response
    /// arrives, replaces the mirror with it.
    pub async fn revalidate<A>(&self, api: &A) -> Revalidation
    where
        A: RequirementsApi + ?Sized,
    {
        let key = self.active_key();
        self.cache.borrow_mut().begin_fetch(&key);
        let result = api.list_requirements(&key).await;

        if !self.alive.get() {
            debug!("Discarding response for {} after unmount", key);
            return Revalidation::Discarded;
        }

        self.cache.borrow_mut().settle(&key, &result, Instant::now());
        match result {
            Ok(page) => {
                if *self.active.borrow() != key {
                    debug!("Response for inactive query {} kept in cache only", key);
                    return Revalidation::Stale;
                }
                debug!("Mirror replaced with {} rows for {}", page.items.len(), key);
                self.mirror.borrow_mut().replace_all(page.items);
                Revalidation::Replaced
            }
            Err(err) if *self.active.borrow() != key && !err.is_unauthenticated() => {
                debug!("Ignoring failure for inactive query {}: {}", key, err);
                Revalidation::Stale
            }
            Err(err) => {
                warn!("Failed to fetch {}: {}", key, err);
                Revalidation::Failed(err)
            }
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        let key = self.active_key();
        self.cache.borrow().is_due_for_revalidation(&key, now)
    }

    /// Stops applying responses; in-flight fetches are discarded
    pub fn unmount(&self) {
        self.alive.set(false);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }
}
