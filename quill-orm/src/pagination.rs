//! Pagination windows
//!
//! Pure arithmetic turning an item count and a requested page into the
//! offset/limit pair for `find_all` plus navigation flags.

use serde::Serialize;
use std::fmt;

use crate::entity::Limit;

/// One page of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub item_count: u64,
    pub page_count: u64,
    pub page_index: u64,
    pub page_size: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub const DEFAULT_SIZE: u64 = 10;

    /// Compute the window for `page_index` (1-based)
    ///
    /// Indexes past the last page clamp to the last page and indexes below 1
    /// clamp to 1. An empty result set always yields page 1 with a zero
    /// limit. A `page_size` of 0 is treated as 1.
    pub fn new(item_count: u64, page_index: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let page_count = item_count / page_size + u64::from(item_count % page_size > 0);

        let (page_index, offset, limit) = if item_count == 0 {
            (1, 0, 0)
        } else {
            let page_index = page_index.clamp(1, page_count);
            (page_index, page_size * (page_index - 1), page_size)
        };

        Self {
            item_count,
            page_count,
            page_index,
            page_size,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }

    /// Page with the default size of 10
    pub fn of(item_count: u64, page_index: u64) -> Self {
        Self::new(item_count, page_index, Self::DEFAULT_SIZE)
    }

    /// `find_all` limit selecting exactly this page
    pub fn window(&self) -> Limit {
        Limit::Window {
            offset: self.offset,
            count: self.limit,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "item_count: {}, page_count: {}, page_index: {}, page_size: {}, offset: {}, limit: {}",
            self.item_count, self.page_count, self.page_index, self.page_size, self.offset, self.limit
        )
    }
}

/// Parse a `?page=` query value; anything unparsable or below 1 is page 1
pub fn parse_page_index(raw: &str) -> u64 {
    raw.trim().parse::<u64>().ok().filter(|index| *index >= 1).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page() {
        let page = Page::new(100, 1, 10);
        assert_eq!(page.page_count, 10);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 10);
        assert!(page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_partial_last_page() {
        let page = Page::new(90, 9, 10);
        assert_eq!((page.page_count, page.offset, page.limit), (9, 80, 10));

        let page = Page::new(91, 10, 10);
        assert_eq!((page.page_count, page.offset, page.limit), (10, 90, 10));
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_clamps_past_last_page() {
        let page = Page::new(25, 99, 10);
        assert_eq!(page.page_index, 3);
        assert_eq!(page.offset, 20);
        assert!(!page.has_next);
    }

    #[test]
    fn test_empty_result_set() {
        for index in [0, 1, 2, 50] {
            let page = Page::new(0, index, 7);
            assert_eq!(page.page_count, 0);
            assert_eq!((page.page_index, page.offset, page.limit), (1, 0, 0));
            assert!(!page.has_next);
            assert!(!page.has_previous);
            assert_eq!(page.window(), Limit::Window { offset: 0, count: 0 });
        }
    }

    #[test]
    fn test_page_count_is_ceiling() {
        for size in 1..=12 {
            for count in 0..=60 {
                let page = Page::new(count, 1, size);
                assert_eq!(page.page_count, count.div_ceil(size), "{} items / {}", count, size);
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(Page::new(5, 0, 2).page_index, 1);
        assert_eq!(Page::new(5, 1, 0).page_size, 1);
        assert_eq!(Page::of(11, 2).offset, 10);
    }

    #[test]
    fn test_parse_page_index() {
        assert_eq!(parse_page_index("3"), 3);
        assert_eq!(parse_page_index(" 2 "), 2);
        assert_eq!(parse_page_index("0"), 1);
        assert_eq!(parse_page_index("-4"), 1);
        assert_eq!(parse_page_index("abc"), 1);
        assert_eq!(parse_page_index(""), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Page::new(25, 2, 10).to_string(),
            "item_count: 25, page_count: 3, page_index: 2, page_size: 10, offset: 10, limit: 10"
        );
    }
}
