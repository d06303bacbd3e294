//! Business Services
//!
//! - `BlueprintService`: blueprint lifecycle, outline reads and locked structural edits
//! - `ServiceConfig`: environment-driven settings and tree policies
//! - `import`: validation and normalization of extracted outline batches

pub mod blueprint_service;
pub mod config;
pub mod error;
pub mod import;

pub use blueprint_service::BlueprintService;
pub use config::ServiceConfig;
pub use error::BlueprintServiceError;
pub use import::{normalize_import, ImportedNode};
