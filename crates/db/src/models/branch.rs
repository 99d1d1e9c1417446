use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Organisational unit (physical shop location) that owns records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
pub struct BranchId(pub u32);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BranchId {
    fn from(value: u32) -> Self {
        BranchId(value)
    }
}
