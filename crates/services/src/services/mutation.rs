//! Create, edit, delete and duplicate against the store, followed by cache
//! invalidation. Nothing here patches a cached collection.

use std::sync::Arc;

use db::{
    RecordStore, RecordStoreExt, StoreError,
    models::{
        branch::BranchId,
        record::{Record, RecordData, RecordKind, ValidationError},
    },
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    access::{Access, AccessScope},
    pending::{ActionKind, PendingGuard},
    selection::{BulkDeletePhase, EmptySelectionError},
    session::SessionContext,
};

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0} is already in progress")]
    Busy(ActionKind),
    #[error("not permitted to {0} records")]
    Forbidden(ActionKind),
    #[error("branch {0} is outside your access scope")]
    OutOfScope(BranchId),
    #[error("{kind} record {id} not found")]
    NotFound { kind: RecordKind, id: Uuid },
    #[error(transparent)]
    EmptySelection(#[from] EmptySelectionError),
    #[error("bulk delete is {0}, not awaiting confirmation")]
    NotConfirming(BulkDeletePhase),
}

impl MutationError {
    /// Outcomes the user gets no toast for.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            MutationError::Busy(_) | MutationError::EmptySelection(_) | MutationError::NotConfirming(_)
        )
    }
}

fn label(kind: RecordKind) -> String {
    let label = kind.to_string().replace('_', " ");
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}

/// Mutations issued on behalf of one resolved [`Access`].
pub struct MutationCoordinator<'a, S: RecordStore> {
    session: &'a SessionContext<S>,
    access: Access,
}

impl<'a, S: RecordStore> MutationCoordinator<'a, S> {
    pub fn new(session: &'a SessionContext<S>, access: Access) -> Self {
        Self { session, access }
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    /// Insert a new record. Under a single-branch scope the record always
    /// lands in that branch; under full scope `branch_id` is required.
    pub async fn create<T: RecordData>(
        &self,
        branch_id: Option<BranchId>,
        data: T,
    ) -> Result<Record<T>, MutationError> {
        let _guard = self.begin(T::KIND, ActionKind::Create)?;
        let result = self.try_create(branch_id, data).await;
        self.finish(T::KIND, ActionKind::Create, result).await
    }

    /// Apply `patch` to record `id`. `reassign_to` moves the record to another
    /// branch and needs destructive capability.
    pub async fn edit<T: RecordData>(
        &self,
        id: Uuid,
        patch: &T::Patch,
        reassign_to: Option<BranchId>,
    ) -> Result<Record<T>, MutationError> {
        let _guard = self.begin(T::KIND, ActionKind::Edit)?;
        let result = self.try_edit(id, patch, reassign_to).await;
        self.finish(T::KIND, ActionKind::Edit, result).await
    }

    /// Remove every id or none. The store provides the atomicity.
    pub async fn delete<T: RecordData>(&self, ids: &[Uuid]) -> Result<u64, MutationError> {
        if ids.is_empty() {
            return Err(EmptySelectionError.into());
        }
        let _guard = self.begin(T::KIND, ActionKind::Delete)?;
        let result = self.try_delete::<T>(ids).await;
        self.finish(T::KIND, ActionKind::Delete, result).await
    }

    /// Insert a copy of record `id`; the store assigns a fresh id and timestamp.
    pub async fn duplicate<T: RecordData>(&self, id: Uuid) -> Result<Record<T>, MutationError> {
        let _guard = self.begin(T::KIND, ActionKind::Duplicate)?;
        let result = self.try_duplicate(id).await;
        self.finish(T::KIND, ActionKind::Duplicate, result).await
    }

    fn begin(&self, kind: RecordKind, action: ActionKind) -> Result<PendingGuard, MutationError> {
        self.session
            .pending()
            .try_begin(kind, action)
            .ok_or(MutationError::Busy(action))
    }

    async fn finish<R>(
        &self,
        kind: RecordKind,
        action: ActionKind,
        result: Result<R, MutationError>,
    ) -> Result<R, MutationError> {
        let notifications = self.session.notifications();
        match &result {
            Ok(_) => {
                self.session.invalidate(kind).await;
                info!(kind = %kind, action = %action, "Mutation completed");
                notifications.success(format!("{} {}", label(kind), action.past_tense()));
            }
            Err(e) if e.is_silent() => {}
            Err(e) => {
                warn!(kind = %kind, action = %action, error = %e, "Mutation failed");
                notifications.error(e.to_string());
            }
        }
        result
    }

    fn require_mutate(&self, action: ActionKind) -> Result<(), MutationError> {
        if !self.access.capabilities.can_mutate {
            return Err(MutationError::Forbidden(action));
        }
        Ok(())
    }

    fn require_destroy(&self, action: ActionKind) -> Result<(), MutationError> {
        if !self.access.capabilities.can_destroy {
            return Err(MutationError::Forbidden(action));
        }
        Ok(())
    }

    fn require_known_branch(&self, branch_id: BranchId) -> Result<(), MutationError> {
        if self.session.policy().branch_name(branch_id).is_none() {
            return Err(ValidationError::new("branch_id", "is not a known branch").into());
        }
        Ok(())
    }

    fn require_scope(&self, branch_id: BranchId) -> Result<(), MutationError> {
        if !self.access.scope.permits(branch_id) {
            return Err(MutationError::OutOfScope(branch_id));
        }
        Ok(())
    }

    async fn current<T: RecordData>(&self) -> Result<Arc<Vec<Record<T>>>, MutationError> {
        Ok(self.session.load::<T>().await?)
    }

    /// Source record, which must exist and be in scope.
    async fn find<T: RecordData>(&self, id: Uuid) -> Result<Record<T>, MutationError> {
        let records = self.current::<T>().await?;
        let record = records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(MutationError::NotFound { kind: T::KIND, id })?;
        self.require_scope(record.branch_id)?;
        Ok(record)
    }

    async fn try_create<T: RecordData>(
        &self,
        branch_id: Option<BranchId>,
        data: T,
    ) -> Result<Record<T>, MutationError> {
        self.require_mutate(ActionKind::Create)?;
        let branch_id = match self.access.scope {
            AccessScope::SingleBranch(own) => own,
            AccessScope::All => {
                branch_id.ok_or_else(|| ValidationError::new("branch_id", "is required"))?
            }
            AccessScope::None => return Err(MutationError::Forbidden(ActionKind::Create)),
        };
        self.require_known_branch(branch_id)?;
        data.validate()?;
        Ok(self.session.store().create(branch_id, &data).await?)
    }

    async fn try_edit<T: RecordData>(
        &self,
        id: Uuid,
        patch: &T::Patch,
        reassign_to: Option<BranchId>,
    ) -> Result<Record<T>, MutationError> {
        self.require_mutate(ActionKind::Edit)?;
        let record = self.find::<T>(id).await?;
        let reassign_to = reassign_to.filter(|b| *b != record.branch_id);
        if let Some(target) = reassign_to {
            self.require_destroy(ActionKind::Edit)?;
            self.require_scope(target)?;
            self.require_known_branch(target)?;
        }
        record.with_patch(patch)?.validate()?;
        Ok(self.session.store().update::<T>(id, reassign_to, patch).await?)
    }

    async fn try_delete<T: RecordData>(&self, ids: &[Uuid]) -> Result<u64, MutationError> {
        self.require_destroy(ActionKind::Delete)?;
        let records = self.current::<T>().await?;
        for id in ids {
            let record = records
                .iter()
                .find(|r| r.id == *id)
                .ok_or(MutationError::NotFound { kind: T::KIND, id: *id })?;
            self.require_scope(record.branch_id)?;
        }
        Ok(self.session.store().delete_records(T::KIND, ids).await?)
    }

    async fn try_duplicate<T: RecordData>(&self, id: Uuid) -> Result<Record<T>, MutationError> {
        self.require_destroy(ActionKind::Duplicate)?;
        let source = self.find::<T>(id).await?;
        Ok(self
            .session
            .store()
            .create(source.branch_id, &source.data)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        expense::{Expense, ExpensePatch},
        identity::Identity,
    };
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::services::{
        notification::NoticeLevel,
        test_support::{FailingStore, test_session},
    };

    async fn session_as(role: &str) -> SessionContext<FailingStore> {
        let session = test_session().await;
        session
            .store()
            .inner()
            .sign_in(Identity::new("user@shop.ph", role))
            .await;
        session.refresh_identity().await.unwrap();
        session
    }

    async fn seed(session: &SessionContext<FailingStore>, branch: u32, name: &str) -> Record<Expense> {
        session
            .store()
            .create(BranchId(branch), &Expense::new(name, 100.0))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_injects_operator_branch_and_invalidates() {
        let session = session_as("branch-cainta").await;
        let mut notices = session.notifications().subscribe();
        assert!(session.load::<Expense>().await.unwrap().is_empty());

        let created = session
            .mutations()
            .await
            .create(Some(BranchId(1)), Expense::new("Water", 450.0))
            .await
            .unwrap();
        assert_eq!(created.branch_id, BranchId(2));
        assert_eq!(session.load::<Expense>().await.unwrap().len(), 1);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.message, "Expense created");
    }

    #[tokio::test]
    async fn test_create_under_full_scope_requires_branch() {
        let session = session_as("owner").await;
        let result = session
            .mutations()
            .await
            .create(None, Expense::new("Rent", 100.0))
            .await;
        assert!(matches!(result, Err(MutationError::Validation(_))));
    }

    #[tokio::test]
    async fn test_undeclared_branch_is_rejected_under_full_scope() {
        let session = session_as("owner").await;
        let mutations = session.mutations().await;
        let created = mutations
            .create(Some(BranchId(9)), Expense::new("Rent", 100.0))
            .await;
        assert!(matches!(created, Err(MutationError::Validation(_))));

        let record = seed(&session, 1, "Rent").await;
        let moved = mutations
            .edit::<Expense>(record.id, &ExpensePatch::default(), Some(BranchId(9)))
            .await;
        assert!(matches!(moved, Err(MutationError::Validation(_))));
        assert!(
            session
                .load::<Expense>()
                .await
                .unwrap()
                .iter()
                .all(|r| r.branch_id == BranchId(1))
        );
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_store_call() {
        let session = session_as("owner").await;
        let mut notices = session.notifications().subscribe();
        let result = session
            .mutations()
            .await
            .create(Some(BranchId(1)), Expense::new("", -5.0))
            .await;
        assert!(matches!(result, Err(MutationError::Validation(_))));
        assert_eq!(session.store().calls(), 0);
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_auditor_and_unrecognized_cannot_mutate() {
        for role in ["auditor", "stranger"] {
            let session = session_as(role).await;
            let result = session
                .mutations()
                .await
                .create(Some(BranchId(1)), Expense::new("Rent", 1.0))
                .await;
            assert!(matches!(result, Err(MutationError::Forbidden(ActionKind::Create))));
        }
    }

    #[tokio::test]
    async fn test_operator_cannot_touch_other_branches() {
        let session = session_as("branch-taytay").await;
        let foreign = seed(&session, 2, "Rent").await;
        let patch = ExpensePatch {
            amount: Some(1.0),
            ..Default::default()
        };
        let result = session
            .mutations()
            .await
            .edit::<Expense>(foreign.id, &patch, None)
            .await;
        assert!(matches!(result, Err(MutationError::OutOfScope(BranchId(2)))));
    }

    #[tokio::test]
    async fn test_operator_cannot_delete_duplicate_or_reassign() {
        let session = session_as("branch-taytay").await;
        let own = seed(&session, 1, "Rent").await;
        let mutations = session.mutations().await;

        assert!(matches!(
            mutations.delete::<Expense>(&[own.id]).await,
            Err(MutationError::Forbidden(ActionKind::Delete))
        ));
        assert!(matches!(
            mutations.duplicate::<Expense>(own.id).await,
            Err(MutationError::Forbidden(ActionKind::Duplicate))
        ));
        let patch = ExpensePatch::default();
        assert!(matches!(
            mutations.edit::<Expense>(own.id, &patch, Some(BranchId(2))).await,
            Err(MutationError::Forbidden(ActionKind::Edit))
        ));
    }

    #[tokio::test]
    async fn test_edit_merges_patch_and_reassigns_branch() {
        let session = session_as("admin").await;
        let record = seed(&session, 1, "Internet").await;
        let patch = ExpensePatch {
            amount: Some(1899.0),
            ..Default::default()
        };
        let updated = session
            .mutations()
            .await
            .edit::<Expense>(record.id, &patch, Some(BranchId(2)))
            .await
            .unwrap();
        assert_eq!(updated.amount, 1899.0);
        assert_eq!(updated.branch_id, BranchId(2));
        assert_eq!(updated.bill_name, "Internet");
    }

    #[tokio::test]
    async fn test_edit_rejects_patch_that_breaks_validation() {
        let session = session_as("admin").await;
        let record = seed(&session, 1, "Internet").await;
        let patch = ExpensePatch {
            bill_name: Some("   ".to_string()),
            ..Default::default()
        };
        let calls = session.store().calls();
        let result = session
            .mutations()
            .await
            .edit::<Expense>(record.id, &patch, None)
            .await;
        assert!(matches!(result, Err(MutationError::Validation(_))));
        // only the cache fill reached the store
        assert_eq!(session.store().calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_duplicate_copies_fields_with_fresh_identity() {
        let session = session_as("owner").await;
        let mut expense = Expense::new("Rent", 12000.0);
        expense.remarks = Some("March".to_string());
        let source = session.store().create(BranchId(2), &expense).await.unwrap();

        let copy = session
            .mutations()
            .await
            .duplicate::<Expense>(source.id)
            .await
            .unwrap();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.data, source.data);
        assert_eq!(copy.branch_id, source.branch_id);
        assert_eq!(session.load::<Expense>().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_not_found() {
        let session = session_as("owner").await;
        seed(&session, 1, "Rent").await;
        let result = session
            .mutations()
            .await
            .delete::<Expense>(&[Uuid::new_v4()])
            .await;
        assert!(matches!(result, Err(MutationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_store_failure_notifies_and_keeps_cache() {
        let session = session_as("owner").await;
        let record = seed(&session, 1, "Rent").await;
        let generation = {
            session.load::<Expense>().await.unwrap();
            session.generation(RecordKind::Expense)
        };
        let mut notices = session.notifications().subscribe();
        session.store().fail_writes(true);

        let result = session
            .mutations()
            .await
            .delete::<Expense>(&[record.id])
            .await;
        assert!(matches!(result, Err(MutationError::Store(_))));
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("write rejected"));
        assert_eq!(session.generation(RecordKind::Expense), generation);
        assert!(!session.pending().is_pending(RecordKind::Expense, ActionKind::Delete));
    }

    #[tokio::test]
    async fn test_empty_and_busy_are_silent() {
        let session = session_as("owner").await;
        let mut notices = session.notifications().subscribe();
        let mutations = session.mutations().await;

        assert!(matches!(
            mutations.delete::<Expense>(&[]).await,
            Err(MutationError::EmptySelection(_))
        ));

        let _held = session
            .pending()
            .try_begin(RecordKind::Expense, ActionKind::Create)
            .unwrap();
        assert!(matches!(
            mutations.create(Some(BranchId(1)), Expense::new("Rent", 1.0)).await,
            Err(MutationError::Busy(ActionKind::Create))
        ));
        assert!(matches!(notices.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(label(RecordKind::JobOrder), "Job order");
        assert_eq!(label(RecordKind::Expense), "Expense");
    }
}
