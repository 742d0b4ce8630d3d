//! Page math and the paginated result envelope.

use serde::Serialize;

use crate::config::PaginationConfig;
use crate::entity::Entity;

/// One entry of the page navigation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub page: u64,
    pub is_current: bool,
}

/// Everything a caller needs to render page navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u64,
    pub page_size: u64,
    pub previous_page: Option<u64>,
    pub next_page: Option<u64>,
    pub page_count: u64,
    pub total_count: u64,
    pub links: Vec<PageLink>,
}

impl PageInfo {
    /// Clamp `requested` into `[1, max(1, page_count)]` and build the window.
    ///
    /// A zero page size is treated as one.
    pub fn compute(
        requested: u64,
        page_size: u64,
        total_count: u64,
        config: &PaginationConfig,
    ) -> Self {
        let page_size = page_size.max(1);
        let page_count = total_count.div_ceil(page_size);
        let page = requested.clamp(1, page_count.max(1));

        let previous_page = (page > 1).then(|| page - 1);
        let next_page = (page < page_count).then(|| page + 1);

        let links = if page_count == 0 || config.max_links == 0 {
            Vec::new()
        } else {
            let start = page.saturating_sub(config.links_before_current).max(1);
            let end = page_count.min(start.saturating_add(config.max_links - 1));
            (start..=end)
                .map(|p| PageLink {
                    page: p,
                    is_current: p == page,
                })
                .collect()
        };

        Self {
            page,
            page_size,
            previous_page,
            next_page,
            page_count,
            total_count,
            links,
        }
    }

    /// Rows to skip for the current page.
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

/// A page of entities with its navigation info.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub pagination: PageInfo,
    pub rows: Vec<Entity>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(page: u64, size: u64, total: u64) -> PageInfo {
        PageInfo::compute(page, size, total, &PaginationConfig::default())
    }

    #[test]
    fn test_second_of_three_pages() {
        let info = compute(2, 10, 25);
        assert_eq!(info.page, 2);
        assert_eq!(info.page_count, 3);
        assert_eq!(info.previous_page, Some(1));
        assert_eq!(info.next_page, Some(3));
        assert_eq!(info.offset(), 10);
        assert_eq!(
            info.links.iter().map(|l| l.page).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(info.links[1].is_current);
    }

    #[test]
    fn test_empty_result_clamps_to_first_page() {
        let info = compute(7, 10, 0);
        assert_eq!(info.page, 1);
        assert_eq!(info.page_count, 0);
        assert_eq!(info.previous_page, None);
        assert_eq!(info.next_page, None);
        assert!(info.links.is_empty());
        assert_eq!(info.offset(), 0);
    }

    #[test]
    fn test_beyond_last_page_clamps() {
        let info = compute(99, 10, 25);
        assert_eq!(info.page, 3);
        assert_eq!(info.next_page, None);
        assert_eq!(info.offset(), 20);

        let info = compute(0, 10, 25);
        assert_eq!(info.page, 1);
    }

    #[test]
    fn test_window_is_bounded() {
        for total in [0_u64, 1, 9, 10, 11, 95, 1000, 12_345] {
            for page in [0_u64, 1, 2, 5, 6, 7, 50, 99, 100, 5000] {
                let info = compute(page, 10, total);
                assert!(info.links.len() <= 10, "{page}/{total}");
                assert!(info.links.iter().all(|l| l.page >= 1 && l.page <= info.page_count));
                assert!(info.page >= 1 && info.page <= info.page_count.max(1));
                if info.page_count > 0 {
                    assert_eq!(info.links.iter().filter(|l| l.is_current).count(), 1);
                }
            }
        }
    }

    #[test]
    fn test_window_keeps_five_preceding_pages() {
        let info = compute(20, 10, 1000);
        let pages: Vec<u64> = info.links.iter().map(|l| l.page).collect();
        assert_eq!(pages, (15..=24).collect::<Vec<_>>());
    }

    #[test]
    fn test_unbounded_window_lists_every_page() {
        let config = PaginationConfig {
            max_links: u64::MAX,
            ..PaginationConfig::default()
        };
        let info = PageInfo::compute(4, 10, 45, &config);
        let pages: Vec<u64> = info.links.iter().map(|l| l.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_page_size_is_one() {
        let info = compute(3, 0, 5);
        assert_eq!(info.page_size, 1);
        assert_eq!(info.page_count, 5);
        assert_eq!(info.offset(), 2);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(compute(1, 10, 5)).unwrap();
        assert_eq!(json["pageCount"], 1);
        assert!(json["previousPage"].is_null());
        assert_eq!(json["links"][0]["isCurrent"], true);
    }
}
