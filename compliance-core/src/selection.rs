//! Multi-row selection for bulk triage
//!
//! Only rows awaiting triage (raw PENDING_REVIEW) can be selected. The
//! selection is reconciled against the mirror after every change so it never
//! holds ids that are no longer on screen or no longer selectable.

use std::collections::BTreeSet;

use crate::models::Requirement;

/// Header checkbox state for the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectAllState {
    pub has_selectable: bool,
    pub all_selected: bool,
    pub some_selected: bool,
}

impl SelectAllState {
    pub fn is_indeterminate(&self) -> bool {
        self.some_selected && !self.all_selected
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

fn selectable_ids(rows: &[Requirement]) -> impl Iterator<Item = &str> {
    rows.iter()
        .filter(|r| r.is_pending_review())
        .map(|r| r.id.as_str())
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks or unchecks one row; ignored unless the row is on `rows` and selectable
    pub fn toggle(&mut self, id: &str, checked: bool, rows: &[Requirement]) -> bool {
        let selectable = rows.iter().any(|r| r.id == id && r.is_pending_review());
        if !selectable {
            return false;
        }
        if checked {
            self.ids.insert(id.to_string())
        } else {
            self.ids.remove(id)
        }
    }

    /// Header checkbox: `true` adds every selectable row of the page, `false`
    /// removes exactly those rows and leaves other ids alone
    pub fn toggle_all(&mut self, checked: bool, rows: &[Requirement]) {
        for id in selectable_ids(rows) {
            if checked {
                self.ids.insert(id.to_string());
            } else {
                self.ids.remove(id);
            }
        }
    }

    pub fn header_state(&self, rows: &[Requirement]) -> SelectAllState {
        let mut total = 0;
        let mut selected = 0;
        for id in selectable_ids(rows) {
            total += 1;
            if self.ids.contains(id) {
                selected += 1;
            }
        }
        SelectAllState {
            has_selectable: total > 0,
            all_selected: total > 0 && selected == total,
            some_selected: selected > 0,
        }
    }

    /// Drops ids that are not selectable rows of `rows`
    pub fn retain_valid(&mut self, rows: &[Requirement]) {
        let valid: BTreeSet<&str> = selectable_ids(rows).collect();
        self.ids.retain(|id| valid.contains(id.as_str()));
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawStatus;
    use proptest::prelude::*;

    fn rows() -> Vec<Requirement> {
        vec![
            Requirement::new("t1", "A").with_status(RawStatus::PendingReview),
            Requirement::new("t2", "B").with_status(RawStatus::PendingReview),
            Requirement::new("o1", "C").with_status(RawStatus::Open),
        ]
    }

    #[test]
    fn test_toggle_requires_selectable_row() {
        let rows = rows();
        let mut selection = Selection::new();
        assert!(!selection.toggle("o1", true, &rows));
        assert!(!selection.toggle("missing", true, &rows));
        assert!(selection.toggle("t1", true, &rows));
        assert_eq!(selection.ids(), vec!["t1".to_string()]);
        assert!(selection.toggle("t1", false, &rows));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_only_touches_page() {
        let rows = rows();
        let mut selection = Selection::new();
        selection.ids.insert("elsewhere".to_string());

        selection.toggle_all(true, &rows);
        assert_eq!(selection.len(), 3);
        assert!(!selection.contains("o1"));

        selection.toggle_all(false, &rows);
        assert_eq!(selection.ids(), vec!["elsewhere".to_string()]);
    }

    #[test]
    fn test_header_state() {
        let rows = rows();
        let mut selection = Selection::new();
        let state = selection.header_state(&rows);
        assert!(state.has_selectable);
        assert!(!state.some_selected);
        assert!(!state.is_indeterminate());

        selection.toggle("t1", true, &rows);
        assert!(selection.header_state(&rows).is_indeterminate());

        selection.toggle("t2", true, &rows);
        let state = selection.header_state(&rows);
        assert!(state.all_selected);
        assert!(!state.is_indeterminate());

        let none = selection.header_state(&rows[2..]);
        assert_eq!(none, SelectAllState::default());
    }

    #[test]
    fn test_retain_valid_after_replacement() {
        let mut selection = Selection::new();
        selection.toggle_all(true, &rows());

        // t1 was triaged elsewhere, t2 left the page
        let replaced = vec![
            Requirement::new("t1", "A").with_status(RawStatus::Open),
            Requirement::new("t3", "D").with_status(RawStatus::PendingReview),
        ];
        selection.retain_valid(&replaced);
        assert!(selection.is_empty());
    }

    fn arb_rows() -> impl Strategy<Value = Vec<Requirement>> {
        proptest::collection::vec((0u8..20, any::<bool>()), 0..12).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(n, pending)| {
                    let status = if pending { RawStatus::PendingReview } else { RawStatus::Open };
                    Requirement::new(format!("r{}", n), "T").with_status(status)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_selection_subset_of_selectable(before in arb_rows(), after in arb_rows()) {
            let mut selection = Selection::new();
            selection.toggle_all(true, &before);
            selection.retain_valid(&after);
            for id in selection.ids() {
                prop_assert!(after.iter().any(|r| r.id == id && r.is_pending_review()));
            }
        }
    }
}
