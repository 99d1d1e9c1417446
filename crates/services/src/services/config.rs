//! TOML configuration for a dashboard session.

use std::path::Path;

use db::{StoreError, models::branch::BranchId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    access::{AccessPolicy, AccessPolicyError, Role},
    pagination::DEFAULT_ITEMS_PER_PAGE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid access policy: {0}")]
    Policy(#[from] AccessPolicyError),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to open database: {0}")]
    Database(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub id: BranchId,
    pub name: String,
    pub marker: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub admin_roles: Vec<String>,
    pub owner_roles: Vec<String>,
    pub auditor_roles: Vec<String>,
    pub branches: Vec<BranchConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub default_items_per_page: usize,
    pub log_filter: String,
    pub access: AccessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://repairdesk.db".to_string(),
            default_items_per_page: DEFAULT_ITEMS_PER_PAGE,
            log_filter: "info".to_string(),
            access: AccessConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_items_per_page == 0 {
            return Err(ConfigError::Invalid(
                "default_items_per_page must be greater than zero".to_string(),
            ));
        }
        self.access_policy()?;
        Ok(())
    }

    /// Install tracing with `log_filter` unless `RUST_LOG` overrides it.
    pub fn init_logging(&self) {
        utils::logging::init_tracing(&self.log_filter);
    }

    /// Duplicate branch ids and markers claimed twice are rejected so the
    /// role mapping stays unambiguous.
    pub fn access_policy(&self) -> Result<AccessPolicy, ConfigError> {
        let access = &self.access;
        let mut policy = AccessPolicy::new();
        for (markers, role) in [
            (&access.admin_roles, Role::Admin),
            (&access.owner_roles, Role::Owner),
            (&access.auditor_roles, Role::Auditor),
        ] {
            for marker in markers {
                policy = policy.grant(marker, role)?;
            }
        }
        for branch in &access.branches {
            policy = policy.branch(branch.id, branch.name.clone(), &branch.marker)?;
        }
        Ok(policy)
    }
}
