//! Configuration for the blueprint service
use crate::models::MAX_WEIGHT;
use crate::operations::{DeletePolicy, TreePolicies, WeightPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the database file path
pub const ENV_DB_PATH: &str = "BLUEPRINT_DB_PATH";
/// Environment variable selecting the weight policy (`ignore|warn|enforce`)
pub const ENV_WEIGHT_POLICY: &str = "BLUEPRINT_WEIGHT_POLICY";
/// Environment variable selecting the delete policy (`cascade|promote|reject`)
pub const ENV_DELETE_POLICY: &str = "BLUEPRINT_DELETE_POLICY";

/// Service-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// libsql database file; `None` resolves to `~/.blueprint/blueprint.db`
    pub database_path: Option<PathBuf>,

    /// Treatment of sibling weight sums above `weight_budget`
    pub weight_policy: WeightPolicy,

    /// What happens to children when a node is deleted
    pub delete_policy: DeletePolicy,

    /// Maximum sum of weights in one sibling group
    pub weight_budget: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            weight_policy: WeightPolicy::Warn,
            delete_policy: DeletePolicy::Cascade,
            weight_budget: MAX_WEIGHT,
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from process environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(policy) = lookup(ENV_WEIGHT_POLICY) {
            config.weight_policy = policy.parse()?;
        }
        if let Some(policy) = lookup(ENV_DELETE_POLICY) {
            config.delete_policy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Resolve the database path, falling back to `~/.blueprint/blueprint.db`
    pub fn resolve_database_path(&self) -> Result<PathBuf, std::io::Error> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let home_dir = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Cannot determine home directory",
            )
        })?;

        Ok(home_dir.join(".blueprint").join("blueprint.db"))
    }

    /// Policies handed to the tree engine
    pub fn tree_policies(&self) -> TreePolicies {
        TreePolicies {
            delete: self.delete_policy,
            weight: self.weight_policy,
            weight_budget: self.weight_budget,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.weight_budget <= 0 {
            return Err("weight_budget must be greater than 0".to_string());
        }
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err("database_path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}
