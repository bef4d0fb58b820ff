//! Pagination of browse queries

use crate::query::WorkQuery;
use serde::{Deserialize, Serialize};

/// Default page size for patron-facing feeds
pub const DEFAULT_SIZE: i64 = 50;

/// Default number of titles sampled for a featured display
pub const DEFAULT_FEATURED_SIZE: i64 = 10;

/// A window onto a browse query's result set.
///
/// The invariants `offset >= 0` and `size > 0` always hold; out-of-range
/// requests are clamped rather than rejected.
///
/// # Examples
/// ```
/// use stacks_browse::pagination::Pagination;
///
/// let first = Pagination::default();
/// assert_eq!((first.offset, first.size), (0, 50));
///
/// let second = first.next_page();
/// assert_eq!((second.offset, second.size), (50, 50));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: i64,
    pub size: i64,
}

impl Pagination {
    /// Build a window, clamping offset to >= 0 and size to >= 1
    pub fn new(offset: i64, size: i64) -> Self {
        Pagination {
            offset: offset.max(0),
            size: size.max(1),
        }
    }

    /// The window immediately after this one
    pub fn next_page(&self) -> Self {
        Pagination {
            offset: self.offset + self.size,
            size: self.size,
        }
    }

    /// Set the query's LIMIT/OFFSET to this window
    pub fn apply(&self, query: &mut WorkQuery) {
        query.set_window(self.offset, self.size);
    }
}

impl Default for Pagination {
    /// First page at the default feed size
    fn default() -> Self {
        Pagination {
            offset: 0,
            size: DEFAULT_SIZE,
        }
    }
}
