//! Role and branch resolution for the signed-in identity.

use std::collections::HashMap;

use db::models::{branch::BranchId, identity::Identity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which records an identity may see and act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    All,
    SingleBranch(BranchId),
    None,
}

impl AccessScope {
    pub fn permits(&self, branch_id: BranchId) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::SingleBranch(own) => *own == branch_id,
            AccessScope::None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Owner,
    /// Sees every branch but cannot change anything.
    Auditor,
    BranchOperator(BranchId),
    Unrecognized,
}

impl Role {
    pub fn scope(&self) -> AccessScope {
        match self {
            Role::Admin | Role::Owner | Role::Auditor => AccessScope::All,
            Role::BranchOperator(branch_id) => AccessScope::SingleBranch(*branch_id),
            Role::Unrecognized => AccessScope::None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Role::Admin | Role::Owner => Capabilities {
                can_mutate: true,
                can_destroy: true,
            },
            Role::BranchOperator(_) => Capabilities {
                can_mutate: true,
                can_destroy: false,
            },
            Role::Auditor | Role::Unrecognized => Capabilities::default(),
        }
    }
}

/// What an identity may do, independent of which branches it sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Create and edit.
    pub can_mutate: bool,
    /// Delete, duplicate and move records between branches.
    pub can_destroy: bool,
}

impl Capabilities {
    /// Operators get their destructive actions hidden.
    pub fn is_unprivileged_operator(&self) -> bool {
        !self.can_destroy
    }
}

/// Everything derived from the current identity, computed once per render.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub identity: Option<Identity>,
    pub role: Role,
    pub scope: AccessScope,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub id: BranchId,
    pub name: String,
    pub marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessPolicyError {
    #[error("marker '{0}' is assigned more than once")]
    DuplicateMarker(String),
    #[error("branch id {0} is declared more than once")]
    DuplicateBranch(BranchId),
    #[error("empty marker")]
    EmptyMarker,
}

/// Exact, case-insensitive mapping from role markers (or full emails) to roles.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    markers: HashMap<String, Role>,
    branches: Vec<BranchInfo>,
}

fn normalize_marker(marker: &str) -> String {
    marker.trim().to_lowercase()
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, marker: &str, role: Role) -> Result<Self, AccessPolicyError> {
        let key = normalize_marker(marker);
        if key.is_empty() {
            return Err(AccessPolicyError::EmptyMarker);
        }
        if self.markers.insert(key.clone(), role).is_some() {
            return Err(AccessPolicyError::DuplicateMarker(key));
        }
        Ok(self)
    }

    pub fn branch(
        mut self,
        id: BranchId,
        name: impl Into<String>,
        marker: &str,
    ) -> Result<Self, AccessPolicyError> {
        if self.branches.iter().any(|b| b.id == id) {
            return Err(AccessPolicyError::DuplicateBranch(id));
        }
        self = self.grant(marker, Role::BranchOperator(id))?;
        self.branches.push(BranchInfo {
            id,
            name: name.into(),
            marker: normalize_marker(marker),
        });
        Ok(self)
    }

    pub fn branches(&self) -> &[BranchInfo] {
        &self.branches
    }

    pub fn branch_name(&self, id: BranchId) -> Option<&str> {
        self.branches
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.name.as_str())
    }

    /// Total: anything not explicitly granted is [`Role::Unrecognized`].
    pub fn role_for(&self, identity: Option<&Identity>) -> Role {
        let Some(identity) = identity else {
            return Role::Unrecognized;
        };
        self.markers
            .get(&normalize_marker(&identity.role))
            .or_else(|| self.markers.get(&normalize_marker(&identity.email)))
            .copied()
            .unwrap_or(Role::Unrecognized)
    }

    pub fn resolve_scope(&self, identity: Option<&Identity>) -> AccessScope {
        self.role_for(identity).scope()
    }

    pub fn capabilities(&self, identity: Option<&Identity>) -> Capabilities {
        self.role_for(identity).capabilities()
    }

    pub fn access_for(&self, identity: Option<&Identity>) -> Access {
        let role = self.role_for(identity);
        Access {
            identity: identity.cloned(),
            role,
            scope: role.scope(),
            capabilities: role.capabilities(),
        }
    }
}
