//! Per-page view state composed over the shared raw collection.

use std::{collections::HashSet, marker::PhantomData};

use chrono::NaiveDate;
use db::{
    RecordStore, StoreError,
    models::record::{Aggregatable, Record, RecordData},
};
use tracing::debug;
use uuid::Uuid;

use super::{
    access::AccessScope,
    aggregate::{Summary, aggregate},
    filter::{DateRange, FilterState, filter, scope_filter},
    mutation::MutationError,
    pagination::Pagination,
    selection::{BulkDeleteError, EmptySelectionError, Selection},
    session::SessionContext,
    sort::{SortCriteria, SortDirection, sort},
};

/// One rendered state of a [`RecordView`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<T> {
    /// Filtered and sorted, before paging.
    pub filtered: Vec<Record<T>>,
    pub page: Vec<Record<T>>,
    pub total_filtered: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub items_per_page: usize,
}

impl<T> ViewSnapshot<T> {
    /// 1-based "showing X to Y of Z" bounds; `None` for an empty view.
    pub fn page_range(&self) -> Option<(usize, usize)> {
        if self.page.is_empty() {
            return None;
        }
        let first = (self.current_page - 1) * self.items_per_page + 1;
        Some((first, first + self.page.len() - 1))
    }

    pub fn filtered_ids(&self) -> Vec<Uuid> {
        self.filtered.iter().map(|r| r.id).collect()
    }

    pub fn page_ids(&self) -> Vec<Uuid> {
        self.page.iter().map(|r| r.id).collect()
    }
}

/// Filter, sort, page and selection state owned by one table instance.
#[derive(Debug, Clone)]
pub struct RecordView<T> {
    filter: FilterState,
    sort: SortCriteria,
    pagination: Pagination,
    selection: Selection,
    last_total: usize,
    seen_generation: Option<u64>,
    _record: PhantomData<T>,
}

impl<T: RecordData> RecordView<T> {
    pub fn new(items_per_page: usize, today: NaiveDate) -> Self {
        Self {
            filter: FilterState::default_for(today),
            sort: SortCriteria::new(),
            pagination: Pagination::new(items_per_page),
            selection: Selection::new(),
            last_total: 0,
            seen_generation: None,
            _record: PhantomData,
        }
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort_criteria(&self) -> &SortCriteria {
        &self.sort
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Called when a new raw collection arrives. The date window returns to
    /// the current month; the search term is kept.
    pub fn sync(&mut self, raw: &[Record<T>], scope: &AccessScope, today: NaiveDate) {
        self.filter.date_range = Some(DateRange::current_month(today));
        self.revalidate(raw, scope);
    }

    /// Run the pipeline: scope, date window and search, then sort, then page.
    /// Also clamps the page and drops selected ids that left the filtered set.
    pub fn snapshot(&mut self, raw: &[Record<T>], scope: &AccessScope) -> ViewSnapshot<T> {
        let filtered = filter(raw, scope, &self.filter);
        let sorted = sort(&filtered, &self.sort);
        self.last_total = sorted.len();
        self.pagination.clamp(sorted.len());

        let visible: HashSet<Uuid> = sorted.iter().map(|r| r.id).collect();
        let dropped = self.selection.retain_visible(&visible);
        if dropped > 0 {
            debug!(kind = %T::KIND, dropped, "Dropped selections outside the filtered set");
        }

        let page = self
            .pagination
            .slice(&sorted)
            .iter()
            .map(|r| (*r).clone())
            .collect();
        ViewSnapshot {
            filtered: sorted.into_iter().cloned().collect(),
            page,
            total_filtered: self.last_total,
            total_pages: self.pagination.total_pages(self.last_total),
            current_page: self.pagination.current_page(),
            items_per_page: self.pagination.items_per_page(),
        }
    }

    /// Load through the session cache, sync on a new generation, and snapshot.
    pub async fn refresh<S: RecordStore>(
        &mut self,
        session: &SessionContext<S>,
    ) -> Result<ViewSnapshot<T>, StoreError> {
        let raw = session.load::<T>().await?;
        let scope = session.scope().await;
        let generation = session.generation(T::KIND);
        if self.seen_generation != Some(generation) {
            self.sync(&raw, &scope, session.today());
            self.seen_generation = Some(generation);
        }
        Ok(self.snapshot(&raw, &scope))
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.filter.search_term = term.into();
        self.pagination.reset();
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.filter.date_range = range;
        self.pagination.reset();
    }

    pub fn reset_filters(&mut self, today: NaiveDate) {
        self.filter.reset(today);
        self.pagination.reset();
    }

    pub fn toggle_sort(&mut self, key: &str) {
        self.sort.toggle(key);
    }

    pub fn set_sort(&mut self, key: &str, direction: SortDirection) {
        self.sort.set(key, direction);
    }

    pub fn clear_sort(&mut self) {
        self.sort.clear();
    }

    pub fn set_items_per_page(&mut self, items_per_page: usize) {
        self.pagination.set_items_per_page(items_per_page);
    }

    /// Clamped against the filtered count of the last snapshot.
    pub fn go_to_page(&mut self, page: usize) {
        self.pagination.go_to(page, self.last_total);
    }

    pub fn next_page(&mut self) {
        self.pagination.next(self.last_total);
    }

    pub fn prev_page(&mut self) {
        self.pagination.prev(self.last_total);
    }

    pub fn toggle_selected(&mut self, id: Uuid) {
        self.selection.toggle(id);
    }

    /// Header checkbox, relative to the whole filtered set rather than the page.
    pub fn toggle_select_all(&mut self, snapshot: &ViewSnapshot<T>) {
        self.selection.toggle_all(&snapshot.filtered_ids());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn request_bulk_delete(&mut self) -> Result<(), EmptySelectionError> {
        self.selection.request_bulk_delete()
    }

    pub fn cancel_bulk_delete(&mut self) {
        self.selection.cancel_bulk_delete();
    }

    /// Delete every selected id still under the current filters. On failure the
    /// selection is kept and the confirmation stays open for a retry.
    pub async fn confirm_bulk_delete<S: RecordStore>(
        &mut self,
        session: &SessionContext<S>,
    ) -> Result<u64, MutationError> {
        let raw = session.load::<T>().await?;
        let scope = session.scope().await;
        let visible: HashSet<Uuid> = filter(&raw, &scope, &self.filter)
            .iter()
            .map(|r| r.id)
            .collect();
        let ids = self.selection.begin_delete(&visible).map_err(|e| match e {
            BulkDeleteError::Empty(e) => MutationError::EmptySelection(e),
            BulkDeleteError::NotConfirming(phase) => MutationError::NotConfirming(phase),
        })?;

        let result = session.mutations().await.delete::<T>(&ids).await;
        self.selection.finish_delete(result.is_ok());
        result
    }

    fn revalidate(&mut self, raw: &[Record<T>], scope: &AccessScope) {
        let filtered = filter(raw, scope, &self.filter);
        let visible: HashSet<Uuid> = filtered.iter().map(|r| r.id).collect();
        self.selection.retain_visible(&visible);
        self.last_total = filtered.len();
        self.pagination.clamp(self.last_total);
    }
}

impl<T: RecordData + Aggregatable> RecordView<T> {
    /// Summary cards over the filtered set; month-over-month change over the
    /// scope-filtered collection.
    pub fn summary(&self, raw: &[Record<T>], scope: &AccessScope, today: NaiveDate) -> Summary {
        let scoped = scope_filter(raw, scope);
        let filtered = filter(raw, scope, &self.filter);
        aggregate(&filtered, &scoped, today)
    }
}
