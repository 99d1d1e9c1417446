//! SQLite-backed [`RecordStore`] used for local operation and tests.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde_json::Value;
use sqlx::{FromRow, SqliteExecutor};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    DBService,
    models::{branch::BranchId, identity::Identity, record::RecordKind},
    store::{RawRecord, RecordStore, StoreError},
};

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    kind: String,
    branch_id: i64,
    created_at: String,
    payload: String,
}

impl RecordRow {
    fn into_raw(self) -> Result<RawRecord, StoreError> {
        let invalid = |reason: String| StoreError::InvalidPayload {
            kind: RecordKind::from_str(&self.kind).unwrap_or(RecordKind::Expense),
            id: self.id,
            reason,
        };
        let kind = RecordKind::from_str(&self.kind)
            .map_err(|_| invalid(format!("unknown kind '{}'", self.kind)))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| invalid(format!("bad created_at '{}': {}", self.created_at, e)))?
            .with_timezone(&Utc);
        let branch_id = u32::try_from(self.branch_id)
            .map_err(|_| invalid(format!("bad branch_id {}", self.branch_id)))?;
        let payload: Value = serde_json::from_str(&self.payload)
            .map_err(|e| invalid(format!("bad payload: {}", e)))?;
        Ok(RawRecord {
            id: self.id,
            kind,
            branch_id: BranchId(branch_id),
            created_at,
            payload,
        })
    }
}

pub struct SqliteRecordStore {
    db: DBService,
    session: RwLock<Option<Identity>>,
}

impl SqliteRecordStore {
    pub fn new(db: DBService) -> Self {
        Self {
            db,
            session: RwLock::new(None),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    /// Record the identity handed back by the auth provider.
    pub async fn sign_in(&self, identity: Identity) {
        info!(email = %identity.email, role = %identity.role, "Session started");
        *self.session.write().await = Some(identity);
    }

    pub async fn sign_out(&self) {
        *self.session.write().await = None;
    }

    async fn find_row<'e, E>(executor: E, kind: RecordKind, id: Uuid) -> Result<RecordRow, StoreError>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, RecordRow>(
            r#"SELECT id, kind, branch_id, created_at, payload
               FROM records
               WHERE kind = $1 AND id = $2"#,
        )
        .bind(kind.to_string())
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::NotFound { kind, id })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"SELECT id, kind, branch_id, created_at, payload
               FROM records
               WHERE kind = $1
               ORDER BY created_at DESC"#,
        )
        .bind(kind.to_string())
        .fetch_all(&self.db.pool)
        .await?;

        let records = rows
            .into_iter()
            .filter_map(|row| match row.into_raw() {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Skipping malformed row");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(kind = %kind, count = records.len(), "Loaded rows");
        Ok(records)
    }

    async fn create_record(
        &self,
        kind: RecordKind,
        branch_id: BranchId,
        payload: Value,
    ) -> Result<RawRecord, StoreError> {
        let id = Uuid::new_v4();
        // Stored with microsecond precision; keep the returned value identical.
        let created_at = Utc::now().trunc_subsecs(6);
        sqlx::query(
            r#"INSERT INTO records (id, kind, branch_id, created_at, payload)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(kind.to_string())
        .bind(i64::from(branch_id.0))
        .bind(created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(serde_json::to_string(&payload)?)
        .execute(&self.db.pool)
        .await?;

        Ok(RawRecord {
            id,
            kind,
            branch_id,
            created_at,
            payload,
        })
    }

    async fn update_record(
        &self,
        kind: RecordKind,
        id: Uuid,
        branch_id: Option<BranchId>,
        patch: Value,
    ) -> Result<RawRecord, StoreError> {
        // Read, merge and write under one transaction so concurrent edits
        // cannot overwrite each other's fields.
        let mut tx = self.db.pool.begin().await?;
        let mut raw = Self::find_row(&mut *tx, kind, id).await?.into_raw()?;
        json_patch::merge(&mut raw.payload, &patch);
        if let Some(branch_id) = branch_id {
            raw.branch_id = branch_id;
        }

        let result = sqlx::query(
            r#"UPDATE records
               SET payload = $1, branch_id = $2
               WHERE kind = $3 AND id = $4"#,
        )
        .bind(serde_json::to_string(&raw.payload)?)
        .bind(i64::from(raw.branch_id.0))
        .bind(kind.to_string())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind, id });
        }
        tx.commit().await?;
        Ok(raw)
    }

    async fn delete_records(&self, kind: RecordKind, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM records WHERE kind = $1 AND id = $2")
                .bind(kind.to_string())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn current_identity(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.session.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        models::{
            expense::{Expense, ExpensePatch},
            record::Record,
        },
        store::RecordStoreExt,
    };

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(DBService::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_then_fetch_typed() {
        let store = store().await;
        let created = store
            .create(BranchId(1), &Expense::new("Rent", 12000.0))
            .await
            .unwrap();
        let fetched = store.fetch::<Expense>().await.unwrap();
        assert_eq!(fetched, vec![created]);
    }

    #[tokio::test]
    async fn test_fetch_is_scoped_by_kind() {
        let store = store().await;
        store
            .create_record(RecordKind::Client, BranchId(1), json!({ "name": "Lito", "phone": "0917" }))
            .await
            .unwrap();
        assert!(store.fetch::<Expense>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_reassigns_branch() {
        let store = store().await;
        let mut expense = Expense::new("Internet", 1699.0);
        expense.remarks = Some("PLDT".to_string());
        let created = store.create(BranchId(1), &expense).await.unwrap();

        let patch = ExpensePatch {
            amount: Some(1899.0),
            remarks: Some(None),
            ..Default::default()
        };
        let updated: Record<Expense> = store
            .update(created.id, Some(BranchId(2)), &patch)
            .await
            .unwrap();
        assert_eq!(updated.bill_name, "Internet");
        assert_eq!(updated.amount, 1899.0);
        assert_eq!(updated.remarks, None);
        assert_eq!(updated.branch_id, BranchId(2));
        assert_eq!(updated.created_at, created.created_at);

        let fetched = store.fetch::<Expense>().await.unwrap();
        assert_eq!(fetched, vec![updated]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_both_fields() {
        let store = store().await;
        let created = store.create(BranchId(1), &Expense::new("Internet", 1699.0)).await.unwrap();

        let amount = ExpensePatch {
            amount: Some(1899.0),
            ..Default::default()
        };
        let remarks = ExpensePatch {
            remarks: Some(Some("Converge".to_string())),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            store.update::<Expense>(created.id, None, &amount),
            store.update::<Expense>(created.id, None, &remarks),
        );
        a.unwrap();
        b.unwrap();

        let fetched = store.fetch::<Expense>().await.unwrap();
        assert_eq!(fetched[0].amount, 1899.0);
        assert_eq!(fetched[0].remarks.as_deref(), Some("Converge"));
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("shop.db").display());

        let store = SqliteRecordStore::new(DBService::new(&url).await.unwrap());
        let created = store.create(BranchId(1), &Expense::new("Rent", 12000.0)).await.unwrap();
        store.db().pool.close().await;

        let reopened = SqliteRecordStore::new(DBService::new(&url).await.unwrap());
        assert_eq!(reopened.fetch::<Expense>().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = store().await;
        let result = store
            .update_record(RecordKind::Expense, Uuid::new_v4(), None, json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_records_removes_listed_ids() {
        let store = store().await;
        let a = store.create(BranchId(1), &Expense::new("A", 1.0)).await.unwrap();
        let b = store.create(BranchId(1), &Expense::new("B", 2.0)).await.unwrap();
        let c = store.create(BranchId(1), &Expense::new("C", 3.0)).await.unwrap();

        let deleted = store
            .delete_records(RecordKind::Expense, &[a.id, c.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        let remaining = store.fetch::<Expense>().await.unwrap();
        assert_eq!(remaining, vec![b]);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let store = store().await;
        store.create(BranchId(1), &Expense::new("Good", 1.0)).await.unwrap();
        sqlx::query(
            "INSERT INTO records (id, kind, branch_id, created_at, payload) VALUES ($1, 'expense', 1, 'yesterday-ish', '{}')",
        )
        .bind(Uuid::new_v4())
        .execute(&store.db().pool)
        .await
        .unwrap();
        store
            .create_record(RecordKind::Expense, BranchId(1), json!({ "bill_name": 5 }))
            .await
            .unwrap();

        assert_eq!(store.fetch_records(RecordKind::Expense).await.unwrap().len(), 2);
        let decoded = store.fetch::<Expense>().await.unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].bill_name, "Good");
    }

    #[tokio::test]
    async fn test_session_identity() {
        let store = store().await;
        assert_eq!(store.current_identity().await.unwrap(), None);
        let identity = Identity::new("owner@shop.ph", "owner");
        store.sign_in(identity.clone()).await;
        assert_eq!(store.current_identity().await.unwrap(), Some(identity));
        store.sign_out().await;
        assert_eq!(store.current_identity().await.unwrap(), None);
    }
}
