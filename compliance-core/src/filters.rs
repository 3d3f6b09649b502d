//! Filter codec
//!
//! Maps the filter selections of the requirement list to and from the
//! navigation query string, and builds the list endpoint query from them.
//!
//! Query keys owned by the codec:
//!
//! - `due`: comma-separated due-window tokens (`overdue`, `due_7`, `due_30`)
//! - `status`: comma-separated raw status tokens
//! - `archived`: `true` when the archived view is selected
//! - `page`: 1-based page, omitted when 1
//!
//! Any other key in the query string is preserved untouched.

use std::collections::BTreeSet;
use std::fmt;
use url::form_urlencoded;

use crate::models::RawStatus;

const DUE_KEY: &str = "due";
const STATUS_KEY: &str = "status";
const ARCHIVED_KEY: &str = "archived";
const PAGE_KEY: &str = "page";

/// Path of the list endpoint, relative to the API base
pub const REQUIREMENTS_PATH: &str = "requirements";

/// Due-window filter; variant order is the canonical query order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DueFilter {
    Overdue,
    DueIn7,
    DueIn30,
}

impl DueFilter {
    pub const ALL: [DueFilter; 3] = [DueFilter::Overdue, DueFilter::DueIn7, DueFilter::DueIn30];

    pub fn as_token(&self) -> &'static str {
        match self {
            DueFilter::Overdue => "overdue",
            DueFilter::DueIn7 => "due_7",
            DueFilter::DueIn30 => "due_30",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL.into_iter().find(|f| f.as_token() == token)
    }
}

impl fmt::Display for DueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueFilter::Overdue => write!(f, "Overdue"),
            DueFilter::DueIn7 => write!(f, "Due in 7 days"),
            DueFilter::DueIn30 => write!(f, "Due in 30 days"),
        }
    }
}

/// UI status bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusFilter {
    Active,
    Completed,
    Triage,
    /// Exclusive of every other bucket
    Archived,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 4] = [
        StatusFilter::Active,
        StatusFilter::Completed,
        StatusFilter::Triage,
        StatusFilter::Archived,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "active" => Some(StatusFilter::Active),
            "completed" => Some(StatusFilter::Completed),
            "triage" => Some(StatusFilter::Triage),
            "archived" => Some(StatusFilter::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::Active => write!(f, "active"),
            StatusFilter::Completed => write!(f, "completed"),
            StatusFilter::Triage => write!(f, "triage"),
            StatusFilter::Archived => write!(f, "archived"),
        }
    }
}

/// Bucket to raw token table, shared by encode and decode.
/// The archived bucket is expressed by the `archived` flag instead.
pub const STATUS_BUCKETS: [(StatusFilter, &[RawStatus]); 3] = [
    (StatusFilter::Active, &[RawStatus::Open, RawStatus::Review]),
    (StatusFilter::Completed, &[RawStatus::Done, RawStatus::Ready]),
    (StatusFilter::Triage, &[RawStatus::PendingReview]),
];

/// Raw tokens behind a bucket
pub fn tokens_for(bucket: StatusFilter) -> &'static [RawStatus] {
    STATUS_BUCKETS
        .iter()
        .find(|(b, _)| *b == bucket)
        .map(|(_, tokens)| *tokens)
        .unwrap_or(&[])
}

/// Bucket a raw token activates
pub fn bucket_for(token: RawStatus) -> Option<StatusFilter> {
    STATUS_BUCKETS
        .iter()
        .find(|(_, tokens)| tokens.contains(&token))
        .map(|(bucket, _)| *bucket)
}

/// Union of the raw tokens of the selected buckets, in table order
pub fn raw_tokens(buckets: &BTreeSet<StatusFilter>) -> Vec<RawStatus> {
    let mut tokens = Vec::new();
    for (bucket, bucket_tokens) in STATUS_BUCKETS.iter() {
        if buckets.contains(bucket) {
            for token in bucket_tokens.iter() {
                if !tokens.contains(token) {
                    tokens.push(*token);
                }
            }
        }
    }
    tokens
}

/// Applies a bucket toggle, keeping archived exclusive of the others
pub fn toggle_status(
    current: &BTreeSet<StatusFilter>,
    bucket: StatusFilter,
    on: bool,
) -> BTreeSet<StatusFilter> {
    let mut next = current.clone();
    if !on {
        next.remove(&bucket);
        return next;
    }
    if bucket == StatusFilter::Archived {
        next.clear();
    } else {
        next.remove(&StatusFilter::Archived);
    }
    next.insert(bucket);
    next
}

/// Filter selections decoded from the navigation query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub due: BTreeSet<DueFilter>,
    pub status: BTreeSet<StatusFilter>,
    /// Requested page, at least 1 (not yet clamped to the page count)
    pub page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            due: BTreeSet::new(),
            status: BTreeSet::new(),
            page: 1,
        }
    }
}

impl FilterState {
    pub fn is_archived_view(&self) -> bool {
        self.status.contains(&StatusFilter::Archived)
    }

    pub fn triage_active(&self) -> bool {
        self.status.contains(&StatusFilter::Triage)
    }
}

/// Partial update to the filter state; `None` leaves the query value alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub due: Option<BTreeSet<DueFilter>>,
    pub status: Option<BTreeSet<StatusFilter>>,
    pub page: Option<u32>,
}

impl FilterPatch {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }

    pub fn touches_filters(&self) -> bool {
        self.due.is_some() || self.status.is_some()
    }
}

/// Ordered query string pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the first occurrence in place, dropping later duplicates
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.pairs[index].1 = value;
                let mut seen = 0;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_query_string())
    }
}

/// Decodes the filter state from a navigation query string
pub fn decode(query: &str) -> FilterState {
    decode_params(&QueryParams::parse(query))
}

pub fn decode_params(params: &QueryParams) -> FilterState {
    let due: BTreeSet<DueFilter> = params
        .get(DUE_KEY)
        .map(|value| value.split(',').filter_map(DueFilter::from_token).collect())
        .unwrap_or_default();

    let archived = params
        .get(ARCHIVED_KEY)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

    let status = if archived {
        BTreeSet::from([StatusFilter::Archived])
    } else {
        params
            .get(STATUS_KEY)
            .map(|value| {
                value
                    .split(',')
                    .filter_map(RawStatus::from_token)
                    .filter_map(bucket_for)
                    .collect()
            })
            .unwrap_or_default()
    };

    FilterState {
        due,
        status,
        page: parse_page(params.get(PAGE_KEY)),
    }
}

/// Positive page number; anything else is page 1
pub fn parse_page(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Applies `patch` to the `current` query string
pub fn encode(current: &str, patch: &FilterPatch) -> String {
    let mut params = QueryParams::parse(current);
    apply_patch(&mut params, patch);
    params.to_query_string()
}

pub fn apply_patch(params: &mut QueryParams, patch: &FilterPatch) {
    if let Some(due) = &patch.due {
        if due.is_empty() {
            params.remove(DUE_KEY);
        } else {
            let joined = due
                .iter()
                .map(DueFilter::as_token)
                .collect::<Vec<_>>()
                .join(",");
            params.set(DUE_KEY, joined);
        }
    }

    if let Some(status) = &patch.status {
        if status.contains(&StatusFilter::Archived) {
            params.remove(STATUS_KEY);
            params.set(ARCHIVED_KEY, "true");
        } else {
            params.remove(ARCHIVED_KEY);
            let tokens = raw_tokens(status);
            if tokens.is_empty() {
                params.remove(STATUS_KEY);
            } else {
                let joined = tokens
                    .iter()
                    .map(RawStatus::as_token)
                    .collect::<Vec<_>>()
                    .join(",");
                params.set(STATUS_KEY, joined);
            }
        }
    }

    if let Some(page) = patch.page {
        if page <= 1 {
            params.remove(PAGE_KEY);
        } else {
            params.set(PAGE_KEY, page.to_string());
        }
    }
}

/// Number of pages for `total` rows, never less than 1
pub fn page_count(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Clamps a requested page into `[1, page_count]`
pub fn clamp_page(requested: u32, total: u64, page_size: u32) -> u32 {
    requested.clamp(1, page_count(total, page_size))
}

/// Query sent to the list endpoint; also the remote cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub due: Vec<DueFilter>,
    pub status: Vec<RawStatus>,
    pub archived: bool,
}

impl ListQuery {
    pub fn from_filters(filters: &FilterState, limit: u32) -> Self {
        let archived = filters.is_archived_view();
        Self {
            page: filters.page.max(1),
            limit: limit.max(1),
            due: filters.due.iter().copied().collect(),
            status: if archived {
                Vec::new()
            } else {
                raw_tokens(&filters.status)
            },
            archived,
        }
    }

    /// Query pairs in the order the endpoint documents them
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if !self.due.is_empty() {
            let due = self.due.iter().map(DueFilter::as_token).collect::<Vec<_>>();
            pairs.push((DUE_KEY, due.join(",")));
        }
        if !self.status.is_empty() {
            let status = self.status.iter().map(RawStatus::as_token).collect::<Vec<_>>();
            pairs.push((STATUS_KEY, status.join(",")));
        }
        if self.archived {
            pairs.push((ARCHIVED_KEY, "true".to_string()));
        }
        pairs
    }
}

impl fmt::Display for ListQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.to_pairs() {
            serializer.append_pair(k, &v);
        }
        write!(f, "/{}?{}", REQUIREMENTS_PATH, serializer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set<T: Ord + Clone>(items: &[T]) -> BTreeSet<T> {
        items.iter().cloned().collect()
    }

    #[test]
    fn test_decode_due_drops_unknown_and_normalises_order() {
        let state = decode("due=due_30,bogus,overdue,due_30");
        assert_eq!(
            state.due.iter().copied().collect::<Vec<_>>(),
            vec![DueFilter::Overdue, DueFilter::DueIn30]
        );
    }

    #[test]
    fn test_decode_status_tokens_to_buckets() {
        let state = decode("status=REVIEW,OPEN,PENDING_REVIEW,UNKNOWN");
        assert_eq!(state.status, set(&[StatusFilter::Active, StatusFilter::Triage]));

        let state = decode("?status=READY");
        assert_eq!(state.status, set(&[StatusFilter::Completed]));
    }

    #[test]
    fn test_decode_archived_flag_is_exclusive() {
        let state = decode("status=OPEN,DONE&archived=true");
        assert_eq!(state.status, set(&[StatusFilter::Archived]));

        let state = decode("status=OPEN&archived=false");
        assert_eq!(state.status, set(&[StatusFilter::Active]));
    }

    #[test]
    fn test_decode_page_fallbacks() {
        assert_eq!(decode("").page, 1);
        assert_eq!(decode("page=0").page, 1);
        assert_eq!(decode("page=-3").page, 1);
        assert_eq!(decode("page=abc").page, 1);
        assert_eq!(decode("page=4").page, 4);
    }

    #[test]
    fn test_encode_archived_clears_status() {
        let patch = FilterPatch {
            status: Some(set(&[StatusFilter::Archived, StatusFilter::Active])),
            ..Default::default()
        };
        let query = encode("status=OPEN%2CREVIEW&tab=list", &patch);
        let params = QueryParams::parse(&query);
        assert_eq!(params.get("status"), None);
        assert_eq!(params.get("archived"), Some("true"));
        assert_eq!(params.get("tab"), Some("list"));
    }

    #[test]
    fn test_encode_bucket_clears_archived() {
        let patch = FilterPatch {
            status: Some(set(&[StatusFilter::Triage, StatusFilter::Active])),
            ..Default::default()
        };
        let query = encode("archived=true", &patch);
        let params = QueryParams::parse(&query);
        assert_eq!(params.get("archived"), None);
        assert_eq!(params.get("status"), Some("OPEN,REVIEW,PENDING_REVIEW"));
    }

    #[test]
    fn test_encode_empty_status_removes_key() {
        let patch = FilterPatch {
            status: Some(BTreeSet::new()),
            due: Some(BTreeSet::new()),
            ..Default::default()
        };
        assert_eq!(encode("status=DONE&due=overdue&q=x", &patch), "q=x");
    }

    #[test]
    fn test_encode_page_one_is_omitted() {
        assert_eq!(encode("page=3&sort=due", &FilterPatch::page(1)), "sort=due");
        assert_eq!(encode("sort=due", &FilterPatch::page(4)), "sort=due&page=4");
        assert_eq!(encode("page=2&sort=due", &FilterPatch::page(5)), "page=5&sort=due");
    }

    #[test]
    fn test_encode_preserves_unrelated_values() {
        let patch = FilterPatch {
            due: Some(set(&[DueFilter::DueIn7])),
            ..Default::default()
        };
        let query = encode("status=DONE&page=2&lang=fr", &patch);
        assert_eq!(query, "status=DONE&page=2&lang=fr&due=due_7");
    }

    #[test]
    fn test_toggle_status_exclusivity() {
        let current = set(&[StatusFilter::Active, StatusFilter::Triage]);
        assert_eq!(
            toggle_status(&current, StatusFilter::Archived, true),
            set(&[StatusFilter::Archived])
        );
        let archived = set(&[StatusFilter::Archived]);
        assert_eq!(
            toggle_status(&archived, StatusFilter::Completed, true),
            set(&[StatusFilter::Completed])
        );
        assert_eq!(
            toggle_status(&current, StatusFilter::Active, false),
            set(&[StatusFilter::Triage])
        );
    }

    #[test]
    fn test_bucket_table_is_bidirectional() {
        for (bucket, tokens) in STATUS_BUCKETS.iter() {
            assert_eq!(tokens_for(*bucket), *tokens);
            for token in tokens.iter() {
                assert_eq!(bucket_for(*token), Some(*bucket));
            }
        }
        assert_eq!(bucket_for(RawStatus::Archived), None);
        assert!(tokens_for(StatusFilter::Archived).is_empty());
    }

    #[test]
    fn test_page_clamping() {
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(30, 10), 3);
        assert_eq!(clamp_page(5, 25, 10), 3);
        assert_eq!(clamp_page(0, 25, 10), 1);
        assert_eq!(clamp_page(2, 0, 10), 1);
    }

    #[test]
    fn test_list_query_pairs() {
        let filters = decode("due=overdue&status=DONE,PENDING_REVIEW&page=2");
        let query = ListQuery::from_filters(&filters, 10);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "2".to_string()),
                ("limit", "10".to_string()),
                ("due", "overdue".to_string()),
                ("status", "DONE,READY,PENDING_REVIEW".to_string()),
            ]
        );

        let archived = ListQuery::from_filters(&decode("archived=true"), 10);
        assert!(archived.status.is_empty());
        assert_eq!(archived.to_pairs().last(), Some(&("archived", "true".to_string())));
    }

    fn due_subset() -> impl Strategy<Value = BTreeSet<DueFilter>> {
        proptest::sample::subsequence(DueFilter::ALL.to_vec(), 0..=3)
            .prop_map(|v| v.into_iter().collect())
    }

    fn status_subset() -> impl Strategy<Value = BTreeSet<StatusFilter>> {
        proptest::sample::subsequence(StatusFilter::ALL.to_vec(), 0..=4)
            .prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_due_round_trip(due in due_subset(), noise in "[a-z]{0,6}") {
            let start = if noise.is_empty() { String::new() } else { format!("x={}", noise) };
            let patch = FilterPatch { due: Some(due.clone()), ..Default::default() };
            let query = encode(&start, &patch);
            prop_assert_eq!(decode(&query).due, due);
            if !noise.is_empty() {
                let params = QueryParams::parse(&query);
                prop_assert_eq!(params.get("x"), Some(noise.as_str()));
            }
        }

        #[test]
        fn prop_status_round_trip_respects_archived(status in status_subset(), prior in status_subset()) {
            let prior_query = encode("", &FilterPatch { status: Some(prior), ..Default::default() });
            let patch = FilterPatch { status: Some(status.clone()), ..Default::default() };
            let decoded = decode(&encode(&prior_query, &patch)).status;
            if status.contains(&StatusFilter::Archived) {
                prop_assert_eq!(decoded, BTreeSet::from([StatusFilter::Archived]));
            } else {
                prop_assert!(!decoded.contains(&StatusFilter::Archived));
                prop_assert_eq!(decoded, status);
            }
        }

        #[test]
        fn prop_page_always_clamped(requested in 0u32..1000, total in 0u64..5000, size in 1u32..100) {
            let page = clamp_page(requested, total, size);
            prop_assert!(page >= 1);
            prop_assert!(page <= page_count(total, size));
        }
    }
}
