//! Row selection that survives paging, plus the bulk-delete confirmation flow.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BulkDeletePhase {
    #[default]
    Idle,
    ConfirmPending,
    Deleting,
}

/// Bulk action requested with nothing selected. Callers treat it as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("nothing is selected")]
pub struct EmptySelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BulkDeleteError {
    #[error(transparent)]
    Empty(#[from] EmptySelectionError),
    #[error("bulk delete is {0}, not awaiting confirmation")]
    NotConfirming(BulkDeletePhase),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<Uuid>,
    phase: BulkDeletePhase,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BulkDeletePhase {
        self.phase
    }

    pub fn toggle(&mut self, id: Uuid) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Header checkbox over the filtered set: selects every id in `visible`
    /// unless all of them are already selected, in which case they are cleared.
    pub fn toggle_all(&mut self, visible: &[Uuid]) {
        if self.all_selected(visible) {
            for id in visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible.iter().copied());
        }
    }

    pub fn all_selected(&self, visible: &[Uuid]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in a stable order.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.ids.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Drop selected ids that are no longer in the filtered set. Returns how
    /// many were dropped.
    pub fn retain_visible(&mut self, visible: &HashSet<Uuid>) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| visible.contains(id));
        before - self.ids.len()
    }

    /// `Idle -> ConfirmPending`.
    pub fn request_bulk_delete(&mut self) -> Result<(), EmptySelectionError> {
        if self.ids.is_empty() {
            return Err(EmptySelectionError);
        }
        if self.phase == BulkDeletePhase::Idle {
            self.phase = BulkDeletePhase::ConfirmPending;
        }
        Ok(())
    }

    /// `ConfirmPending -> Idle`; the selection itself is kept.
    pub fn cancel_bulk_delete(&mut self) {
        if self.phase == BulkDeletePhase::ConfirmPending {
            self.phase = BulkDeletePhase::Idle;
        }
    }

    /// `ConfirmPending -> Deleting`. Stale ids are revalidated against
    /// `visible` first so only rows under the current filters are deleted.
    pub fn begin_delete(&mut self, visible: &HashSet<Uuid>) -> Result<Vec<Uuid>, BulkDeleteError> {
        if self.phase != BulkDeletePhase::ConfirmPending {
            return Err(BulkDeleteError::NotConfirming(self.phase));
        }
        self.retain_visible(visible);
        if self.ids.is_empty() {
            self.phase = BulkDeletePhase::Idle;
            return Err(EmptySelectionError.into());
        }
        self.phase = BulkDeletePhase::Deleting;
        Ok(self.ids())
    }

    /// `Deleting -> Idle` with the selection cleared on success, or back to
    /// `ConfirmPending` with the selection intact on failure.
    pub fn finish_delete(&mut self, succeeded: bool) {
        if self.phase != BulkDeletePhase::Deleting {
            return;
        }
        if succeeded {
            self.ids.clear();
            self.phase = BulkDeletePhase::Idle;
        } else {
            self.phase = BulkDeletePhase::ConfirmPending;
        }
    }
}
