//! RuleGraph Data Upgrade Core
//!
//! Version-to-version data upgrades for a rule-engine platform's persisted
//! state: rule chain graphs, entity views, alarms and device profiles.
//!
//! # Modules
//!
//! - [`models`] - Entities, typed identifiers, relations and paging types
//! - [`db`] - Storage collaborator traits and the snapshot-backed [`db::InMemoryStore`]
//! - [`services`] - Bulk updater, graph rewriter, per-version steps and the orchestrator
//! - [`config`] - Page sizes and progress settings

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{ConfigError, UpgradeConfig};
pub use db::{DatabaseError, InMemoryStore};
pub use models::*;
pub use services::*;
