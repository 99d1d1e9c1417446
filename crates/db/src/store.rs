//! Data access boundary: everything the dashboard core needs from the hosted backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    branch::BranchId,
    identity::Identity,
    record::{Record, RecordData, RecordKind},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} record {id} not found")]
    NotFound { kind: RecordKind, id: Uuid },
    #[error("invalid {kind} payload for {id}: {reason}")]
    InvalidPayload {
        kind: RecordKind,
        id: Uuid,
        reason: String,
    },
    #[error("not signed in")]
    Unauthenticated,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Shared(#[from] Arc<StoreError>),
}

/// Untyped row as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: Uuid,
    pub kind: RecordKind,
    pub branch_id: BranchId,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}

/// Backend-as-a-service client contract.
///
/// Identifiers and creation timestamps are always assigned by the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>, StoreError>;

    async fn create_record(
        &self,
        kind: RecordKind,
        branch_id: BranchId,
        payload: Value,
    ) -> Result<RawRecord, StoreError>;

    /// Apply `patch` as a JSON merge patch; `branch_id` reassigns the owner when set.
    async fn update_record(
        &self,
        kind: RecordKind,
        id: Uuid,
        branch_id: Option<BranchId>,
        patch: Value,
    ) -> Result<RawRecord, StoreError>;

    /// Remove every listed record or none of them.
    async fn delete_records(&self, kind: RecordKind, ids: &[Uuid]) -> Result<u64, StoreError>;

    /// `None` means nobody is signed in.
    async fn current_identity(&self) -> Result<Option<Identity>, StoreError>;
}

/// Typed helpers over [`RecordStore`] that validate rows at the boundary.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    /// Fetch and decode every record of `T`'s kind. Rows that do not decode are
    /// skipped so a single corrupt row never empties a page.
    async fn fetch<T: RecordData>(&self) -> Result<Vec<Record<T>>, StoreError> {
        let raw = self.fetch_records(T::KIND).await?;
        let total = raw.len();
        let records: Vec<Record<T>> = raw
            .into_iter()
            .filter_map(|row| match Record::<T>::try_from_raw(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(kind = %T::KIND, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect();
        tracing::debug!(kind = %T::KIND, total, decoded = records.len(), "Fetched records");
        Ok(records)
    }

    async fn create<T: RecordData>(
        &self,
        branch_id: BranchId,
        data: &T,
    ) -> Result<Record<T>, StoreError> {
        let payload = serde_json::to_value(data)?;
        let raw = self.create_record(T::KIND, branch_id, payload).await?;
        Record::try_from_raw(raw)
    }

    async fn update<T: RecordData>(
        &self,
        id: Uuid,
        branch_id: Option<BranchId>,
        patch: &T::Patch,
    ) -> Result<Record<T>, StoreError> {
        let patch = serde_json::to_value(patch)?;
        let raw = self.update_record(T::KIND, id, branch_id, patch).await?;
        Record::try_from_raw(raw)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn fetch_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>, StoreError> {
        (**self).fetch_records(kind).await
    }

    async fn create_record(
        &self,
        kind: RecordKind,
        branch_id: BranchId,
        payload: Value,
    ) -> Result<RawRecord, StoreError> {
        (**self).create_record(kind, branch_id, payload).await
    }

    async fn update_record(
        &self,
        kind: RecordKind,
        id: Uuid,
        branch_id: Option<BranchId>,
        patch: Value,
    ) -> Result<RawRecord, StoreError> {
        (**self).update_record(kind, id, branch_id, patch).await
    }

    async fn delete_records(&self, kind: RecordKind, ids: &[Uuid]) -> Result<u64, StoreError> {
        (**self).delete_records(kind, ids).await
    }

    async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        (**self).current_identity().await
    }
}
