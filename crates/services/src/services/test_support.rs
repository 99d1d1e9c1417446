//! Shared fixtures for the service tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use db::{
    DBService, RawRecord, RecordStore, StoreError,
    models::{branch::BranchId, identity::Identity, record::RecordKind},
    sqlite_store::SqliteRecordStore,
};
use serde_json::Value;
use uuid::Uuid;

use super::{
    access::{AccessPolicy, Role},
    session::SessionContext,
};

/// SQLite store whose writes can be switched to fail, counting data calls.
pub struct FailingStore {
    inner: SqliteRecordStore,
    fail_writes: AtomicBool,
    calls: AtomicUsize,
}

impl FailingStore {
    pub async fn new() -> Self {
        Self {
            inner: SqliteRecordStore::new(DBService::new_in_memory().await.unwrap()),
            fail_writes: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &SqliteRecordStore {
        &self.inner
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fetch, create, update and delete calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn fetch_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_records(kind).await
    }

    async fn create_record(
        &self,
        kind: RecordKind,
        branch_id: BranchId,
        payload: Value,
    ) -> Result<RawRecord, StoreError> {
        self.write()?;
        self.inner.create_record(kind, branch_id, payload).await
    }

    async fn update_record(
        &self,
        kind: RecordKind,
        id: Uuid,
        branch_id: Option<BranchId>,
        patch: Value,
    ) -> Result<RawRecord, StoreError> {
        self.write()?;
        self.inner.update_record(kind, id, branch_id, patch).await
    }

    async fn delete_records(&self, kind: RecordKind, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.write()?;
        self.inner.delete_records(kind, ids).await
    }

    async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        self.inner.current_identity().await
    }
}

pub fn test_policy() -> AccessPolicy {
    AccessPolicy::new()
        .grant("admin", Role::Admin)
        .and_then(|p| p.grant("owner", Role::Owner))
        .and_then(|p| p.grant("auditor", Role::Auditor))
        .and_then(|p| p.branch(BranchId(1), "Taytay", "branch-taytay"))
        .and_then(|p| p.branch(BranchId(2), "Cainta", "branch-cainta"))
        .unwrap()
}

pub async fn test_session() -> SessionContext<FailingStore> {
    SessionContext::new(Arc::new(FailingStore::new().await), test_policy())
}
