use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// The signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    /// Role marker assigned by the auth provider (e.g. `admin`, `branch-taytay`).
    pub role: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: email.into(),
            role: role.into(),
        }
    }
}
