//! Pagination windower
//!
//! Selects the rows of one page from a window of candidates fetched in scan
//! order (see [`Paginator::scans_ascending`]). Boundary positions are taken
//! from the candidate window so that rows suppressed by policy never change
//! how pages advance.

use super::options::{Direction, Paginator};

/// Rows selected for one page, as indices into the candidate window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSelection {
    /// Admitted candidates in presentation order
    pub emitted: Vec<usize>,
    /// Candidate anchoring the start of the page (presentation order)
    pub first: Option<usize>,
    /// Candidate anchoring the end of the page (presentation order)
    pub last: Option<usize>,
    /// More rows may follow the page in the scan direction
    pub has_more: bool,
    /// Candidates examined
    pub candidates: usize,
    /// Candidates refused before the page filled
    pub denied: usize,
}

/// Applies the page window to fetched candidates
pub struct Windower<'a> {
    paginator: &'a Paginator,
}

impl<'a> Windower<'a> {
    pub fn new(paginator: &'a Paginator) -> Self {
        Self { paginator }
    }

    /// Rows to request from storage: one past the window, to detect more
    pub fn fetch_size(&self) -> usize {
        self.paginator.window_size().saturating_add(1)
    }

    /// Selects the page from `candidates`, which must be in scan order.
    ///
    /// The candidate vector is truncated to the window. `admit` decides per
    /// candidate whether it is emitted. Once `limit` rows are emitted the
    /// rest of the window is checked for another admitted row: if there is
    /// one the page ends at the last emitted row, otherwise it ends at the
    /// window edge as if it had never filled. Paging back over a page thus
    /// reproduces the bounds it was reached from.
    pub fn select<T, E, F>(&self, candidates: &mut Vec<T>, mut admit: F) -> Result<WindowSelection, E>
    where
        F: FnMut(&T) -> Result<bool, E>,
    {
        let window = self.paginator.window_size();
        let mut has_more = candidates.len() > window;
        candidates.truncate(window);

        if candidates.is_empty() {
            return Ok(WindowSelection {
                emitted: Vec::new(),
                first: None,
                last: None,
                has_more,
                candidates: 0,
                denied: 0,
            });
        }

        let mut first = 0;
        let mut last = candidates.len() - 1;
        let mut emitted = Vec::new();
        let mut denied = 0;

        let mut rows = candidates.iter().enumerate();
        for (i, candidate) in rows.by_ref() {
            if !admit(candidate)? {
                denied += 1;
                continue;
            }
            emitted.push(i);
            if emitted.len() == self.paginator.limit {
                last = i;
                break;
            }
        }
        if last < candidates.len() - 1 {
            let mut more = false;
            for (_, candidate) in rows {
                if admit(candidate)? {
                    more = true;
                    break;
                }
            }
            if more {
                has_more = true;
            } else {
                last = candidates.len() - 1;
            }
        }

        if self.paginator.direction == Direction::Backward {
            emitted.reverse();
            std::mem::swap(&mut first, &mut last);
        }

        Ok(WindowSelection {
            emitted,
            first: Some(first),
            last: Some(last),
            has_more,
            candidates: candidates.len(),
            denied,
        })
    }
}
