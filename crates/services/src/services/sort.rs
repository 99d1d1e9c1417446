//! Multi-key, type-aware, stable sorting of record views.

use std::cmp::Ordering;

use db::models::record::{FieldValue, Record, RecordData};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub key: String,
    pub direction: SortDirection,
}

/// Ordered criteria; the first one is the primary key. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriteria(Vec<SortCriterion>);

impl SortCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: impl Into<String>, direction: SortDirection) -> Self {
        Self(vec![SortCriterion {
            key: key.into(),
            direction,
        }])
    }

    /// Replace the criterion for `key` in place, or append it as the least
    /// significant one.
    pub fn set(&mut self, key: impl Into<String>, direction: SortDirection) {
        let key = key.into();
        match self.0.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.direction = direction,
            None => self.0.push(SortCriterion { key, direction }),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.0.retain(|c| c.key != key);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Column-header click: flip the primary column, or make `key` the sole
    /// ascending criterion.
    pub fn toggle(&mut self, key: &str) {
        match self.0.first() {
            Some(primary) if primary.key == key => {
                let direction = primary.direction.flipped();
                self.0 = vec![SortCriterion {
                    key: key.to_string(),
                    direction,
                }];
            }
            _ => *self = Self::single(key, SortDirection::Ascending),
        }
    }

    pub fn primary(&self) -> Option<&SortCriterion> {
        self.0.first()
    }

    pub fn direction_of(&self, key: &str) -> Option<SortDirection> {
        self.0.iter().find(|c| c.key == key).map(|c| c.direction)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortCriterion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Precomputed comparison key for one record under one criterion.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Missing,
    Time(i64),
    Number(f64),
    Text(String),
}

impl SortKey {
    fn cmp(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Less,
            (_, SortKey::Missing) => Ordering::Greater,
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // Unreachable: a column is keyed with a single mode.
            _ => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnMode {
    Time,
    Number,
    Text,
}

/// A column compares as timestamps when every present value is date-like, as
/// numbers when every present value parses as one, and as case-insensitive
/// text otherwise. Deciding per column keeps the comparator a total order.
fn column_mode(values: &[Option<FieldValue>]) -> ColumnMode {
    let present = || values.iter().flatten();
    if present().next().is_some() && present().all(|v| v.as_timestamp().is_some()) {
        ColumnMode::Time
    } else if present().all(|v| v.as_number().is_some()) {
        ColumnMode::Number
    } else {
        ColumnMode::Text
    }
}

fn key_for(value: Option<FieldValue>, mode: ColumnMode) -> SortKey {
    let Some(value) = value else {
        return SortKey::Missing;
    };
    match mode {
        ColumnMode::Time => value
            .as_timestamp()
            .map(SortKey::Time)
            .unwrap_or(SortKey::Missing),
        ColumnMode::Number => value
            .as_number()
            .map(SortKey::Number)
            .unwrap_or(SortKey::Missing),
        ColumnMode::Text => SortKey::Text(value.as_text().to_lowercase()),
    }
}

/// Return a new, stably sorted sequence. The first criterion dominates; later
/// criteria only break its ties. No criteria means input order.
pub fn sort<'a, T: RecordData>(
    records: &[&'a Record<T>],
    criteria: &SortCriteria,
) -> Vec<&'a Record<T>> {
    if criteria.is_empty() {
        return records.to_vec();
    }

    let mut columns: Vec<Vec<SortKey>> = Vec::with_capacity(criteria.len());
    for criterion in criteria.iter() {
        let values: Vec<Option<FieldValue>> =
            records.iter().map(|r| r.field(&criterion.key)).collect();
        let mode = column_mode(&values);
        columns.push(values.into_iter().map(|v| key_for(v, mode)).collect());
    }

    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        criteria
            .iter()
            .zip(&columns)
            .map(|(criterion, keys)| criterion.direction.apply(keys[a].cmp(&keys[b])))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    order.into_iter().map(|i| records[i]).collect()
}
