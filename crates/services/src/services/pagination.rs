use serde::{Deserialize, Serialize};

pub const DEFAULT_ITEMS_PER_PAGE: usize = 10;

/// Number of pages needed for `len` items; never less than one.
pub fn total_pages(len: usize, items_per_page: usize) -> usize {
    let per_page = items_per_page.max(1);
    len.div_ceil(per_page).max(1)
}

/// Slice out the 1-based `current_page`. Out-of-range pages yield an empty slice.
pub fn paginate<T>(records: &[T], current_page: usize, items_per_page: usize) -> &[T] {
    let per_page = items_per_page.max(1);
    if current_page == 0 {
        return &[];
    }
    let start = (current_page - 1).saturating_mul(per_page);
    if start >= records.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(records.len());
    &records[start..end]
}

/// Page position for one view. `current_page` stays within
/// `1..=total_pages(total, items_per_page)` as long as callers clamp after the
/// filtered count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    current_page: usize,
    items_per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_ITEMS_PER_PAGE)
    }
}

impl Pagination {
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

    pub fn total_pages(&self, total: usize) -> usize {
        total_pages(total, self.items_per_page)
    }

    pub fn clamp(&mut self, total: usize) {
        self.current_page = self.current_page.clamp(1, self.total_pages(total));
    }

    /// Always returns to the first page.
    pub fn set_items_per_page(&mut self, items_per_page: usize) {
        self.items_per_page = items_per_page.max(1);
        self.current_page = 1;
    }

    pub fn go_to(&mut self, page: usize, total: usize) {
        self.current_page = page;
        self.clamp(total);
    }

    pub fn next(&mut self, total: usize) {
        self.go_to(self.current_page.saturating_add(1), total);
    }

    pub fn prev(&mut self, total: usize) {
        self.go_to(self.current_page.saturating_sub(1), total);
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn slice<'a, T>(&self, records: &'a [T]) -> &'a [T] {
        paginate(records, self.current_page, self.items_per_page)
    }
}
