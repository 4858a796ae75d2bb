//! Pagination options and the resolved paginator

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

use super::cursor::Cursor;
use super::errors::{PaginationError, PaginationResult};
use super::keys::parse_sort_key_list;

/// Sort order of the result set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }

    pub fn parse(s: &str) -> PaginationResult<Self> {
        match s {
            "ascending" => Ok(SortOrder::Ascending),
            "descending" => Ok(SortOrder::Descending),
            other => Err(PaginationError::InvalidSortOrder(other.to_string())),
        }
    }
}

/// Paging direction, independent of sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `StartingAfter`
    Forward,
    /// `EndingBefore`
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// Caller-supplied pagination options
///
/// ```ignore
/// let options = PaginationOptions::new()
///     .limit(10)
///     .sort_key("name,id")
///     .starting_after(previous.next);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub limit_multiplier: Option<usize>,
    #[serde(default)]
    pub starting_after: Option<Cursor>,
    #[serde(default)]
    pub ending_before: Option<Cursor>,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
}

impl PaginationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit_multiplier(mut self, multiplier: usize) -> Self {
        self.limit_multiplier = Some(multiplier);
        self
    }

    pub fn starting_after(mut self, cursor: Cursor) -> Self {
        self.starting_after = Some(cursor);
        self
    }

    pub fn ending_before(mut self, cursor: Cursor) -> Self {
        self.ending_before = Some(cursor);
        self
    }

    /// Comma-joined column names, ending with `id`
    pub fn sort_key(mut self, keys: impl Into<String>) -> Self {
        self.sort_key = Some(keys.into());
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    /// True when no option was supplied (un-paginated execution)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates the options and applies configured defaults
    pub fn resolve(&self, config: &EngineConfig) -> PaginationResult<Paginator> {
        let limit = self.limit.unwrap_or(config.default_limit);
        if limit == 0 || limit > config.max_limit {
            return Err(PaginationError::InvalidLimit {
                limit,
                max: config.max_limit,
            });
        }

        let limit_multiplier = self.limit_multiplier.unwrap_or(config.limit_multiplier);
        if limit_multiplier == 0 {
            return Err(PaginationError::InvalidLimitMultiplier);
        }

        let (cursor, direction) = match (&self.starting_after, &self.ending_before) {
            (Some(_), Some(_)) => return Err(PaginationError::ConflictingBoundaries),
            (Some(cursor), None) => {
                if cursor.is_end() {
                    return Err(PaginationError::InvalidBoundary {
                        cursor: cursor.to_string(),
                        direction: Direction::Forward.as_str(),
                    });
                }
                (cursor.clone(), Direction::Forward)
            }
            (None, Some(cursor)) => {
                if cursor.is_begin() {
                    return Err(PaginationError::InvalidBoundary {
                        cursor: cursor.to_string(),
                        direction: Direction::Backward.as_str(),
                    });
                }
                (cursor.clone(), Direction::Backward)
            }
            (None, None) => (Cursor::begin(), Direction::Forward),
        };

        if cursor.as_str().len() > config.max_cursor_length {
            return Err(PaginationError::CursorTooLong {
                len: cursor.as_str().len(),
                max: config.max_cursor_length,
            });
        }

        let sort_keys = match &self.sort_key {
            Some(keys) => parse_sort_key_list(keys),
            None => vec!["id".to_string()],
        };

        Ok(Paginator {
            limit,
            limit_multiplier,
            sort_keys,
            sort_order: self.sort_order.unwrap_or_default(),
            cursor,
            direction,
            paginated: true,
        })
    }
}

/// Validated pagination state for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    pub limit: usize,
    pub limit_multiplier: usize,
    /// Requested sort key names, not yet checked against the object
    pub sort_keys: Vec<String>,
    pub sort_order: SortOrder,
    pub cursor: Cursor,
    pub direction: Direction,
    /// False for calls made without any pagination option
    pub paginated: bool,
}

/// Boundary cursors of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBounds {
    pub next: Cursor,
    pub prev: Cursor,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageBounds {
    /// Bounds reported by a degraded or un-paginated call
    pub fn empty() -> Self {
        Self {
            next: Cursor::end(),
            prev: Cursor::begin(),
            has_next: false,
            has_prev: false,
        }
    }
}

impl Paginator {
    /// Single window of `max_limit` rows sorted by ascending id
    pub fn unpaginated(config: &EngineConfig) -> Self {
        Self {
            limit: config.max_limit,
            limit_multiplier: 1,
            sort_keys: vec!["id".to_string()],
            sort_order: SortOrder::Ascending,
            cursor: Cursor::begin(),
            direction: Direction::Forward,
            paginated: false,
        }
    }

    /// True for the page that opens a walk: forward from the beginning or
    /// backward from the end. Un-paginated calls always open one.
    pub fn is_initial_query(&self) -> bool {
        match self.direction {
            Direction::Forward => self.cursor.is_begin(),
            Direction::Backward => self.cursor.is_end(),
        }
    }

    /// Number of candidate rows one page may scan
    pub fn window_size(&self) -> usize {
        self.limit.saturating_mul(self.limit_multiplier)
    }

    /// True when the scan walks the order towards larger values.
    ///
    /// Forward paging over an ascending order and backward paging over a
    /// descending order both seek rows greater than the cursor.
    pub fn scans_ascending(&self) -> bool {
        matches!(
            (self.sort_order, self.direction),
            (SortOrder::Ascending, Direction::Forward) | (SortOrder::Descending, Direction::Backward)
        )
    }

    /// Computes the page bounds from the window's first and last rows
    /// (in presentation order) and whether more candidates remain.
    pub fn bounds(&self, first: Option<Cursor>, last: Option<Cursor>, has_more: bool) -> PageBounds {
        let (next, prev) = match self.direction {
            Direction::Forward => {
                let next = match (has_more, last) {
                    (true, Some(last)) => last,
                    _ => Cursor::end(),
                };
                let prev = if self.cursor.is_begin() {
                    Cursor::begin()
                } else {
                    first.unwrap_or_else(Cursor::end)
                };
                (next, prev)
            }
            Direction::Backward => {
                let prev = match (has_more, first) {
                    (true, Some(first)) => first,
                    _ => Cursor::begin(),
                };
                let next = if self.cursor.is_end() {
                    Cursor::end()
                } else {
                    last.unwrap_or_else(Cursor::begin)
                };
                (next, prev)
            }
        };

        PageBounds {
            has_next: !next.is_end(),
            has_prev: !prev.is_begin(),
            next,
            prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_defaults() {
        let paginator = PaginationOptions::new().resolve(&config()).unwrap();
        assert_eq!(paginator.limit, 50);
        assert_eq!(paginator.sort_keys, vec!["id".to_string()]);
        assert_eq!(paginator.sort_order, SortOrder::Ascending);
        assert_eq!(paginator.direction, Direction::Forward);
        assert!(paginator.cursor.is_begin());
        assert!(paginator.scans_ascending());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(matches!(
            PaginationOptions::new().limit(0).resolve(&config()),
            Err(PaginationError::InvalidLimit { .. })
        ));
        assert!(matches!(
            PaginationOptions::new().limit(1501).resolve(&config()),
            Err(PaginationError::InvalidLimit { .. })
        ));
        assert!(PaginationOptions::new().limit(1500).resolve(&config()).is_ok());
    }

    #[test]
    fn test_conflicting_and_invalid_boundaries() {
        let both = PaginationOptions::new()
            .starting_after(Cursor::begin())
            .ending_before(Cursor::end());
        assert_eq!(both.resolve(&config()), Err(PaginationError::ConflictingBoundaries));

        assert!(matches!(
            PaginationOptions::new().starting_after(Cursor::end()).resolve(&config()),
            Err(PaginationError::InvalidBoundary { .. })
        ));
        assert!(matches!(
            PaginationOptions::new().ending_before(Cursor::begin()).resolve(&config()),
            Err(PaginationError::InvalidBoundary { .. })
        ));
    }

    #[test]
    fn test_scan_direction() {
        let backward_desc = PaginationOptions::new()
            .ending_before(Cursor::end())
            .sort_order(SortOrder::Descending)
            .resolve(&config())
            .unwrap();
        assert!(backward_desc.scans_ascending());

        let forward_desc = PaginationOptions::new()
            .sort_order(SortOrder::Descending)
            .resolve(&config())
            .unwrap();
        assert!(!forward_desc.scans_ascending());
    }

    #[test]
    fn test_forward_bounds() {
        let paginator = PaginationOptions::new().resolve(&config()).unwrap();
        let bounds = paginator.bounds(Some(Cursor::new("id:a")), Some(Cursor::new("id:b")), true);
        assert_eq!(bounds.next, Cursor::new("id:b"));
        assert!(bounds.prev.is_begin());
        assert!(bounds.has_next);
        assert!(!bounds.has_prev);

        let last_page = paginator.bounds(Some(Cursor::new("id:a")), Some(Cursor::new("id:b")), false);
        assert!(last_page.next.is_end());
        assert!(!last_page.has_next);
    }

    #[test]
    fn test_backward_bounds_from_end() {
        let paginator = PaginationOptions::new()
            .ending_before(Cursor::end())
            .resolve(&config())
            .unwrap();
        let bounds = paginator.bounds(Some(Cursor::new("id:a")), Some(Cursor::new("id:b")), true);
        assert_eq!(bounds.prev, Cursor::new("id:a"));
        assert!(bounds.next.is_end());
        assert!(bounds.has_prev);
        assert!(!bounds.has_next);
    }

    #[test]
    fn test_initial_query() {
        let resolve = |options: PaginationOptions| options.resolve(&config()).unwrap();
        assert!(resolve(PaginationOptions::new()).is_initial_query());
        assert!(resolve(PaginationOptions::new().ending_before(Cursor::end())).is_initial_query());
        assert!(!resolve(PaginationOptions::new().starting_after(Cursor::new("id:a"))).is_initial_query());
        assert!(!resolve(PaginationOptions::new().ending_before(Cursor::new("id:a"))).is_initial_query());
        assert!(Paginator::unpaginated(&config()).is_initial_query());
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("descending").unwrap(), SortOrder::Descending);
        assert!(SortOrder::parse("sideways").is_err());
    }
}
