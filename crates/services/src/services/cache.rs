//! Shared raw-collection cache keyed by record kind.
//!
//! Entries are only ever replaced by a refetch after [`RecordCache::invalidate`];
//! nothing patches a cached collection in place. A fetch that was in flight
//! when its kind was invalidated is discarded and never served.

use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use db::{
    RecordStore, RecordStoreExt, StoreError,
    models::record::{Record, RecordData, RecordKind},
};
use moka::future::Cache;
use tracing::{debug, info};

/// Invalidation count at the moment a fetch started: (all kinds, this kind).
type Epoch = (u64, u64);

#[derive(Clone)]
struct Entry {
    epoch: Epoch,
    records: Arc<dyn Any + Send + Sync>,
}

#[derive(Clone)]
pub struct RecordCache {
    entries: Cache<RecordKind, Entry>,
    generations: Arc<DashMap<RecordKind, u64>>,
    epochs: Arc<DashMap<RecordKind, u64>>,
    global_epoch: Arc<AtomicU64>,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().max_capacity(64).build(),
            generations: Arc::new(DashMap::new()),
            epochs: Arc::new(DashMap::new()),
            global_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached collection for `T`, fetched on a miss. Concurrent misses for the
    /// same kind share one fetch.
    pub async fn load<T, S>(&self, store: &S) -> Result<Arc<Vec<Record<T>>>, StoreError>
    where
        T: RecordData,
        S: RecordStore + ?Sized,
    {
        loop {
            let entry = match self.entries.get(&T::KIND).await {
                Some(entry) => {
                    debug!(kind = %T::KIND, "Record cache hit");
                    entry
                }
                None => {
                    self.entries
                        .try_get_with(T::KIND, self.fetch::<T, S>(store))
                        .await?
                }
            };
            if entry.epoch == self.epoch(T::KIND) {
                return Self::downcast(entry.records);
            }
            debug!(kind = %T::KIND, "Discarding collection fetched before invalidation");
            self.entries.invalidate(&T::KIND).await;
        }
    }

    async fn fetch<T, S>(&self, store: &S) -> Result<Entry, StoreError>
    where
        T: RecordData,
        S: RecordStore + ?Sized,
    {
        let epoch = self.epoch(T::KIND);
        let records = store.fetch::<T>().await?;
        if epoch == self.epoch(T::KIND) {
            let generation = self.bump(T::KIND);
            info!(kind = %T::KIND, count = records.len(), generation, "Refetched records");
        }
        Ok(Entry {
            epoch,
            records: Arc::new(records),
        })
    }

    /// Drop the cached collection; the next [`load`](Self::load) refetches.
    pub async fn invalidate(&self, kind: RecordKind) {
        debug!(kind = %kind, "Invalidating record cache");
        *self.epochs.entry(kind).or_insert(0) += 1;
        self.entries.invalidate(&kind).await;
    }

    pub async fn invalidate_all(&self) {
        self.global_epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of accepted fetches for `kind`. Views compare it against the
    /// last value they saw to notice a new raw collection.
    pub fn generation(&self, kind: RecordKind) -> u64 {
        self.generations.get(&kind).map(|g| *g).unwrap_or(0)
    }

    fn epoch(&self, kind: RecordKind) -> Epoch {
        let own = self.epochs.get(&kind).map(|e| *e).unwrap_or(0);
        (self.global_epoch.load(Ordering::SeqCst), own)
    }

    fn bump(&self, kind: RecordKind) -> u64 {
        let mut generation = self.generations.entry(kind).or_insert(0);
        *generation += 1;
        *generation
    }

    fn downcast<T: RecordData>(
        records: Arc<dyn Any + Send + Sync>,
    ) -> Result<Arc<Vec<Record<T>>>, StoreError> {
        records.downcast::<Vec<Record<T>>>().map_err(|_| {
            StoreError::Rejected(format!("cached {} collection has an unexpected type", T::KIND))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use db::{
        DBService, RawRecord,
        models::{branch::BranchId, expense::Expense, identity::Identity},
        sqlite_store::SqliteRecordStore,
    };
    use serde_json::Value;
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(DBService::new_in_memory().await.unwrap())
    }

    /// Store whose fetch can be held after the rows were read.
    struct HeldStore {
        inner: SqliteRecordStore,
        hold: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RecordStore for HeldStore {
        async fn fetch_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>, StoreError> {
            let rows = self.inner.fetch_records(kind).await?;
            if self.hold.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            Ok(rows)
        }

        async fn create_record(
            &self,
            kind: RecordKind,
            branch_id: BranchId,
            payload: Value,
        ) -> Result<RawRecord, StoreError> {
            self.inner.create_record(kind, branch_id, payload).await
        }

        async fn update_record(
            &self,
            kind: RecordKind,
            id: Uuid,
            branch_id: Option<BranchId>,
            patch: Value,
        ) -> Result<RawRecord, StoreError> {
            self.inner.update_record(kind, id, branch_id, patch).await
        }

        async fn delete_records(&self, kind: RecordKind, ids: &[Uuid]) -> Result<u64, StoreError> {
            self.inner.delete_records(kind, ids).await
        }

        async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
            self.inner.current_identity().await
        }
    }

    #[tokio::test]
    async fn test_load_caches_until_invalidated() {
        let store = store().await;
        let cache = RecordCache::new();
        store.create(BranchId(1), &Expense::new("Rent", 100.0)).await.unwrap();

        let first = cache.load::<Expense, _>(&store).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(cache.generation(RecordKind::Expense), 1);

        store.create(BranchId(1), &Expense::new("Water", 20.0)).await.unwrap();
        let cached = cache.load::<Expense, _>(&store).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cache.generation(RecordKind::Expense), 1);

        cache.invalidate(RecordKind::Expense).await;
        let refetched = cache.load::<Expense, _>(&store).await.unwrap();
        assert_eq!(refetched.len(), 2);
        assert_eq!(cache.generation(RecordKind::Expense), 2);
    }

    #[tokio::test]
    async fn test_kinds_are_cached_independently() {
        let store = store().await;
        let cache = RecordCache::new();
        cache.load::<Expense, _>(&store).await.unwrap();
        assert_eq!(cache.generation(RecordKind::Expense), 1);
        assert_eq!(cache.generation(RecordKind::Technician), 0);
    }

    #[tokio::test]
    async fn test_fetch_in_flight_during_invalidate_is_not_served() {
        let store = Arc::new(HeldStore {
            inner: store().await,
            hold: AtomicBool::new(true),
            reached: Notify::new(),
            release: Notify::new(),
        });
        let cache = RecordCache::new();

        let in_flight = tokio::spawn({
            let cache = cache.clone();
            let store = store.clone();
            async move { cache.load::<Expense, _>(&*store).await.map(|r| r.len()) }
        });
        store.reached.notified().await;

        store.create(BranchId(1), &Expense::new("Rent", 100.0)).await.unwrap();
        cache.invalidate(RecordKind::Expense).await;
        store.release.notify_one();

        assert_eq!(in_flight.await.unwrap().unwrap(), 1);
        assert_eq!(cache.load::<Expense, _>(&*store).await.unwrap().len(), 1);
        assert_eq!(cache.generation(RecordKind::Expense), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all_drops_every_kind() {
        let store = store().await;
        let cache = RecordCache::new();
        cache.load::<Expense, _>(&store).await.unwrap();
        store.create(BranchId(1), &Expense::new("Rent", 100.0)).await.unwrap();

        cache.invalidate_all().await;
        assert_eq!(cache.load::<Expense, _>(&store).await.unwrap().len(), 1);
        assert_eq!(cache.generation(RecordKind::Expense), 2);
    }
}
