//! Blueprint records
//!
//! A blueprint is the container that owns one outline forest. Its payload
//! mirrors what the import wizard captures: a display name, a description
//! and free-form notes that helped locate the outline inside the source file.

use super::node::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Extraction hints recorded at import time
    #[serde(default)]
    pub ai_notes: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Blueprint {
    pub fn new(name: String, description: String, ai_notes: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            ai_notes,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        Ok(())
    }
}

/// Sparse blueprint update (name and description only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BlueprintUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => {
                Err(ValidationError::MissingField("name".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn apply_to(&self, blueprint: &mut Blueprint) {
        if let Some(name) = &self.name {
            blueprint.name = name.clone();
        }
        if let Some(description) = &self.description {
            blueprint.description = description.clone();
        }
        blueprint.modified_at = Utc::now();
    }
}
