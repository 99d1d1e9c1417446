use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::branch::BranchId;
use crate::store::{RawRecord, StoreError};

/// Entity types held by the store. The record cache is keyed by this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Expense,
    Technician,
    JobOrder,
    Client,
    Material,
}

/// A single field value exposed for sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Bool(bool),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Numeric view of the value; text counts when it parses as a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Millisecond timestamp for date-like values, including RFC 3339 text.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            FieldValue::Date(d) => Some(d.timestamp_millis()),
            FieldValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|d| d.timestamp_millis()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Date(d) => d.to_rfc3339(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

/// Client-side constraint violation, raised before any store call is attempted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a number"));
    }
    if value < 0.0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

pub(crate) fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match value.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::new(field, "must be a valid email address")),
    }
}

/// Per-domain payload of a stored record.
pub trait RecordData:
    Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: RecordKind;

    /// All-optional companion used for edits; serialised as a JSON merge patch.
    type Patch: Debug + Clone + Default + Serialize + Send + Sync + 'static;

    /// Human-readable fields joined into the free-text search string.
    fn search_projection(&self) -> Vec<String>;

    /// Sortable field lookup by its serialised name.
    fn field(&self, key: &str) -> Option<FieldValue>;

    fn validate(&self) -> Result<(), ValidationError>;
}

/// Records that carry a monetary amount and a grouping category.
pub trait Aggregatable {
    fn amount(&self) -> f64;
    fn category(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Record<T> {
    pub id: Uuid,
    pub branch_id: BranchId,
    pub created_at: DateTime<Utc>,
    pub data: T,
}

impl<T> std::ops::Deref for Record<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T: RecordData> Record<T> {
    /// Field lookup covering the envelope columns as well as the domain fields.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "id" => Some(FieldValue::Text(self.id.to_string())),
            "created_at" => Some(FieldValue::Date(self.created_at)),
            "branch_id" => Some(FieldValue::Number(f64::from(self.branch_id.0))),
            _ => self.data.field(key),
        }
    }

    /// Lower-cased searchable string: formatted creation date followed by the
    /// record's own projection.
    pub fn search_text(&self) -> String {
        let mut parts = vec![
            self.created_at.format("%b %-d, %Y").to_string(),
            self.created_at.format("%Y-%m-%d").to_string(),
        ];
        parts.extend(self.data.search_projection());
        parts.join(" ").to_lowercase()
    }

    /// Validate an untyped store row into a typed record.
    pub fn try_from_raw(raw: RawRecord) -> Result<Self, StoreError> {
        if raw.kind != T::KIND {
            return Err(StoreError::InvalidPayload {
                kind: T::KIND,
                id: raw.id,
                reason: format!("expected {} row, got {}", T::KIND, raw.kind),
            });
        }
        let data: T =
            serde_json::from_value(raw.payload).map_err(|e| StoreError::InvalidPayload {
                kind: T::KIND,
                id: raw.id,
                reason: e.to_string(),
            })?;
        Ok(Record {
            id: raw.id,
            branch_id: raw.branch_id,
            created_at: raw.created_at,
            data,
        })
    }

    /// The data this record would hold once `patch` is merged, computed locally
    /// the same way the store merges it.
    pub fn with_patch(&self, patch: &T::Patch) -> Result<T, StoreError> {
        let mut merged = serde_json::to_value(&self.data)?;
        json_patch::merge(&mut merged, &serde_json::to_value(patch)?);
        serde_json::from_value(merged).map_err(|e| StoreError::InvalidPayload {
            kind: T::KIND,
            id: self.id,
            reason: e.to_string(),
        })
    }
}
