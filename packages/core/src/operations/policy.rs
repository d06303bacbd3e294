//! Delete and weight policies applied by the tree engine

use crate::models::{OutlineNode, SiblingGroup, MAX_WEIGHT};
use crate::operations::TreeOperationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happens to the children of a deleted node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletePolicy {
    /// Remove the node and its whole subtree
    #[default]
    Cascade,
    /// Splice the children into the deleted node's slot, keeping their order
    PromoteChildren,
    /// Refuse to delete a node that still has children
    RejectIfHasChildren,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "promote" | "promote_children" => Ok(Self::PromoteChildren),
            "reject" | "reject_if_has_children" => Ok(Self::RejectIfHasChildren),
            other => Err(format!(
                "unknown delete policy '{}' (expected cascade, promote or reject)",
                other
            )),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cascade => "cascade",
            Self::PromoteChildren => "promote",
            Self::RejectIfHasChildren => "reject",
        })
    }
}

/// How the sibling weight budget is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeightPolicy {
    /// No check at all
    Ignore,
    /// Log a warning and proceed
    #[default]
    Warn,
    /// Fail with `WeightBudgetExceeded`
    Enforce,
}

impl FromStr for WeightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!(
                "unknown weight policy '{}' (expected ignore, warn or enforce)",
                other
            )),
        }
    }
}

impl fmt::Display for WeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ignore => "ignore",
            Self::Warn => "warn",
            Self::Enforce => "enforce",
        })
    }
}

/// Policies the engine consults on every operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePolicies {
    pub delete: DeletePolicy,
    pub weight: WeightPolicy,
    /// Maximum sum of weights inside one sibling group
    pub weight_budget: i64,
}

impl Default for TreePolicies {
    fn default() -> Self {
        Self {
            delete: DeletePolicy::default(),
            weight: WeightPolicy::default(),
            weight_budget: MAX_WEIGHT,
        }
    }
}

impl TreePolicies {
    /// Check the weight sum of `group` once `incoming` joins it.
    ///
    /// `siblings` is the group's current membership; the node identified by
    /// `replacing` (if any) is left out of the sum, which covers both weight
    /// updates and same-group moves.
    pub fn check_weight_budget(
        &self,
        group: &SiblingGroup,
        siblings: &[OutlineNode],
        replacing: Option<&str>,
        incoming: i64,
    ) -> Result<(), TreeOperationError> {
        if self.weight == WeightPolicy::Ignore {
            return Ok(());
        }

        let total: i64 = siblings
            .iter()
            .filter(|n| Some(n.id.as_str()) != replacing)
            .map(|n| n.weight)
            .sum::<i64>()
            + incoming;

        if total <= self.weight_budget {
            return Ok(());
        }

        match self.weight {
            WeightPolicy::Enforce => Err(TreeOperationError::weight_budget_exceeded(
                group.clone(),
                total,
                self.weight_budget,
            )),
            _ => {
                tracing::warn!(
                    "⚠️  Sibling weights in group {} total {} (budget {})",
                    group,
                    total,
                    self.weight_budget
                );
                Ok(())
            }
        }
    }
}
