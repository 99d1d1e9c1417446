//! Per-action busy flags. A second trigger of an action that is still in
//! flight is refused rather than queued.

use std::sync::Arc;

use dashmap::DashSet;
use db::models::record::RecordKind;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Create,
    Edit,
    Delete,
    Duplicate,
}

impl ActionKind {
    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Create => "created",
            ActionKind::Edit => "updated",
            ActionKind::Delete => "deleted",
            ActionKind::Duplicate => "duplicated",
        }
    }
}

type ActionKey = (RecordKind, ActionKind);

#[derive(Debug, Clone, Default)]
pub struct PendingActions {
    in_flight: Arc<DashSet<ActionKey>>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the same action on the same kind is already running.
    pub fn try_begin(&self, kind: RecordKind, action: ActionKind) -> Option<PendingGuard> {
        let key = (kind, action);
        if !self.in_flight.insert(key) {
            return None;
        }
        Some(PendingGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        })
    }

    pub fn is_pending(&self, kind: RecordKind, action: ActionKind) -> bool {
        self.in_flight.contains(&(kind, action))
    }
}

/// Clears the busy flag when dropped, whatever the outcome.
#[derive(Debug)]
pub struct PendingGuard {
    in_flight: Arc<DashSet<ActionKey>>,
    key: ActionKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
