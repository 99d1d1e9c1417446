//! Scope, date-window and free-text filtering of a raw record collection.

use chrono::{DateTime, NaiveDate, Utc};
use db::models::record::{Record, RecordData};
use serde::{Deserialize, Serialize};
use utils::date::{month_end, month_start};

use super::access::AccessScope;

/// Inclusive calendar-date window, compared against the UTC creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn current_month(today: NaiveDate) -> Self {
        Self {
            from: month_start(today),
            to: month_end(today),
        }
    }

    /// An inverted range (`from > to`) contains nothing.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        self.from <= date && date <= self.to
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub search_term: String,
    pub date_range: Option<DateRange>,
}

impl FilterState {
    /// Empty search over the current calendar month.
    pub fn default_for(today: NaiveDate) -> Self {
        Self {
            search_term: String::new(),
            date_range: Some(DateRange::current_month(today)),
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::default_for(today);
    }
}

/// Drop every record outside `scope`.
pub fn scope_filter<'a, T: RecordData>(
    records: &'a [Record<T>],
    scope: &AccessScope,
) -> Vec<&'a Record<T>> {
    match scope {
        AccessScope::None => Vec::new(),
        AccessScope::All => records.iter().collect(),
        AccessScope::SingleBranch(_) => records
            .iter()
            .filter(|r| scope.permits(r.branch_id))
            .collect(),
    }
}

pub fn date_filter<'a, T: RecordData>(
    records: Vec<&'a Record<T>>,
    range: Option<&DateRange>,
) -> Vec<&'a Record<T>> {
    match range {
        None => records,
        Some(range) => records
            .into_iter()
            .filter(|r| range.contains(r.created_at))
            .collect(),
    }
}

pub fn search_filter<'a, T: RecordData>(
    records: Vec<&'a Record<T>>,
    search_term: &str,
) -> Vec<&'a Record<T>> {
    let needle = search_term.to_lowercase();
    if needle.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| r.search_text().contains(&needle))
        .collect()
}

/// Scope filter, then date window, then free-text search. Input order is kept.
pub fn filter<'a, T: RecordData>(
    records: &'a [Record<T>],
    scope: &AccessScope,
    state: &FilterState,
) -> Vec<&'a Record<T>> {
    let scoped = scope_filter(records, scope);
    let windowed = date_filter(scoped, state.date_range.as_ref());
    search_filter(windowed, &state.search_term)
}
