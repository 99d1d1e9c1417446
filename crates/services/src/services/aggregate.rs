//! Summary-card statistics over a filtered record view.

use std::collections::HashMap;

use chrono::NaiveDate;
use db::models::record::{Aggregatable, Record, RecordData};
use serde::{Deserialize, Serialize};
use utils::date::{previous_month, same_month};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PeriodChange {
    Percent(f64),
    /// Nothing was recorded last month, so no ratio exists.
    NoPriorData,
}

impl PeriodChange {
    pub fn between(previous: f64, current: f64) -> Self {
        if previous == 0.0 {
            return PeriodChange::NoPriorData;
        }
        PeriodChange::Percent((current - previous) / previous * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// First-seen spelling of the category.
    pub label: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_amount: f64,
    pub unique_category_count: usize,
    pub period_change: PeriodChange,
    pub current_month_total: f64,
    pub previous_month_total: f64,
    /// Sorted by total descending, then label.
    pub grouped: Vec<CategoryTotal>,
}

pub fn normalize_category(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn group_totals<T>(records: &[&Record<T>]) -> Vec<CategoryTotal>
where
    T: RecordData + Aggregatable,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<CategoryTotal> = Vec::new();
    for record in records {
        let label = record.data.category();
        let slot = *index.entry(normalize_category(&label)).or_insert_with(|| {
            groups.push(CategoryTotal {
                label: label.trim().to_string(),
                total: 0.0,
                count: 0,
            });
            groups.len() - 1
        });
        groups[slot].total += record.data.amount();
        groups[slot].count += 1;
    }
    groups.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
    });
    groups
}

fn month_total<T>(records: &[&Record<T>], month: NaiveDate) -> f64
where
    T: RecordData + Aggregatable,
{
    records
        .iter()
        .filter(|r| same_month(r.created_at.date_naive(), month))
        .map(|r| r.data.amount())
        .sum()
}

/// Compare this calendar month against the previous one over `scoped`, the
/// scope-filtered collection with no date window applied.
pub fn period_change<T>(scoped: &[&Record<T>], today: NaiveDate) -> (f64, f64, PeriodChange)
where
    T: RecordData + Aggregatable,
{
    let current = month_total(scoped, today);
    let previous = month_total(scoped, previous_month(today));
    (current, previous, PeriodChange::between(previous, current))
}

/// Totals and grouping come from `filtered`; the month-over-month change comes
/// from `scoped` so it ignores whatever date window is being browsed.
pub fn aggregate<T>(filtered: &[&Record<T>], scoped: &[&Record<T>], today: NaiveDate) -> Summary
where
    T: RecordData + Aggregatable,
{
    let grouped = group_totals(filtered);
    let (current_month_total, previous_month_total, period_change) = period_change(scoped, today);
    Summary {
        total_amount: filtered.iter().map(|r| r.data.amount()).sum(),
        unique_category_count: grouped.len(),
        period_change,
        current_month_total,
        previous_month_total,
        grouped,
    }
}
