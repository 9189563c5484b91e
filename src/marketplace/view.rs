//! Filter/Sort Stage and Pagination View.
//!
//! Pure functions over the merged collection, plus the fixed-size page
//! slicer and its prefetch predicate. Changing the search query or sort key
//! resets pagination to page 1; page changes alone never refetch data.

use super::record::ServerRecord;

/// Fixed page size for the marketplace view.
pub const MARKETPLACE_PAGE_SIZE: usize = 12;

/// Case-insensitive substring filter over name OR publisher.
/// An empty query is the identity; survivor order is preserved.
pub fn filter_servers(servers: &[ServerRecord], query: &str) -> Vec<ServerRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return servers.to_vec();
    }
    servers
        .iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&query) || s.publisher.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

/// Sort the collection in place.
///
/// `"name"` sorts ascending case-insensitively, `"stars"` descending by
/// popularity; any other key is the identity. When `preserve_config_order`
/// is set nothing is sorted; an agent's own config file order is
/// meaningful and must not be disturbed. `sort_by` is stable, so ties keep
/// their relative input order.
pub fn sort_servers(servers: &mut [ServerRecord], key: &str, preserve_config_order: bool) {
    if preserve_config_order {
        return;
    }
    match key {
        "name" => servers.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        "stars" => servers.sort_by(|a, b| b.popularity.cmp(&a.popularity)),
        _ => {}
    }
}

/// Fixed-size page window over the filtered/sorted collection.
#[derive(Debug, Clone)]
pub struct Paginator {
    current_page: usize,
    items_per_page: usize,
}

impl Paginator {
    /// A zero page size is clamped to 1; page math divides by it.
    pub fn new(items_per_page: usize) -> Self {
        Self {
            current_page: 1,
            items_per_page: items_per_page.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    /// Jump to a page (1-indexed). Pure index update, no refetch.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Back to page 1. Called whenever search or sort changes.
    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.items_per_page)
    }

    /// The current page's slice. Out-of-range pages yield an empty slice,
    /// not an error.
    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.current_page - 1).saturating_mul(self.items_per_page);
        if start >= items.len() {
            return &[];
        }
        let end = (start + self.items_per_page).min(items.len());
        &items[start..end]
    }

    /// Whether the aggregation engine should fetch another registry page:
    /// fewer than two pages' worth of items remain beyond the current page,
    /// more registry data exists, and no fetch is already in flight.
    pub fn needs_prefetch(&self, total_items: usize, has_more: bool, loading: bool) -> bool {
        if !has_more || loading {
            return false;
        }
        let shown = self.current_page * self.items_per_page;
        let remaining = total_items.saturating_sub(shown);
        remaining < self.items_per_page * 2
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(MARKETPLACE_PAGE_SIZE)
    }
}
