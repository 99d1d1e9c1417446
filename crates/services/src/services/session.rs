//! Explicit per-session context handed to every view: store, cache,
//! notifications, busy flags, access policy and the signed-in identity.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use db::{
    DBService, RecordStore, StoreError,
    models::{
        identity::Identity,
        record::{Record, RecordData, RecordKind},
    },
    sqlite_store::SqliteRecordStore,
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    access::{Access, AccessPolicy, AccessScope, Capabilities},
    cache::RecordCache,
    config::{Config, ConfigError},
    mutation::MutationCoordinator,
    notification::NotificationService,
    pagination::DEFAULT_ITEMS_PER_PAGE,
    pending::PendingActions,
    view::RecordView,
};

pub struct SessionContext<S: RecordStore> {
    store: Arc<S>,
    cache: RecordCache,
    notifications: NotificationService,
    pending: PendingActions,
    policy: AccessPolicy,
    identity: RwLock<Option<Identity>>,
    items_per_page: usize,
}

impl<S: RecordStore> SessionContext<S> {
    pub fn new(store: Arc<S>, policy: AccessPolicy) -> Self {
        Self {
            store,
            cache: RecordCache::new(),
            notifications: NotificationService::new(),
            pending: PendingActions::new(),
            policy,
            identity: RwLock::new(None),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }

    pub fn from_config(store: Arc<S>, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut session = Self::new(store, config.access_policy()?);
        session.items_per_page = config.default_items_per_page;
        Ok(session)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Re-read the identity from the store. A different identity drops every
    /// cached collection.
    pub async fn refresh_identity(&self) -> Result<Access, StoreError> {
        let identity = self.store.current_identity().await?;
        let changed = {
            let mut current = self.identity.write().await;
            let changed = *current != identity;
            *current = identity.clone();
            changed
        };
        let access = self.policy.access_for(identity.as_ref());
        if changed {
            self.cache.invalidate_all().await;
            info!(
                email = identity.as_ref().map(|i| i.email.as_str()).unwrap_or("-"),
                role = ?access.role,
                "Session identity changed"
            );
        }
        Ok(access)
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    pub async fn access(&self) -> Access {
        let identity = self.identity.read().await;
        self.policy.access_for(identity.as_ref())
    }

    pub async fn scope(&self) -> AccessScope {
        self.access().await.scope
    }

    pub async fn capabilities(&self) -> Capabilities {
        self.access().await.capabilities
    }

    pub async fn load<T: RecordData>(&self) -> Result<Arc<Vec<Record<T>>>, StoreError> {
        self.cache.load::<T, S>(&self.store).await
    }

    pub async fn invalidate(&self, kind: RecordKind) {
        self.cache.invalidate(kind).await;
    }

    pub fn generation(&self, kind: RecordKind) -> u64 {
        self.cache.generation(kind)
    }

    /// Coordinator bound to the access resolved right now.
    pub async fn mutations(&self) -> MutationCoordinator<'_, S> {
        MutationCoordinator::new(self, self.access().await)
    }

    pub fn new_view<T: RecordData>(&self) -> RecordView<T> {
        RecordView::new(self.items_per_page, self.today())
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

impl SessionContext<SqliteRecordStore> {
    /// Open the database at `config.database_url` and build a session on it.
    pub async fn open(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let db = DBService::new(&config.database_url).await?;
        Self::from_config(Arc::new(SqliteRecordStore::new(db)), config)
    }
}
