//! Upgrade Services
//!
//! - [`BulkUpdater`] - paginate-transform-advance driver
//! - [`NestedRuleNodeRewriter`] - cross-chain edge to proxy node rewrite
//! - [`condition_spec`] - alarm condition document patching
//! - [`migrations`] - the remaining per-entity upgrade transforms
//! - [`DataUpdateService`] - version dispatch and step sequencing

pub mod bulk_updater;
pub mod condition_spec;
pub mod context;
pub mod data_update;
pub mod error;
pub mod graph_rewriter;
pub mod migration_step;
pub mod migrations;

pub use bulk_updater::{
    BulkUpdater, EntityUpdater, PageMode, ProgressCounter, UpdateOutcome, DEFAULT_PAGE_SIZE,
};
pub use context::UpgradeContext;
pub use data_update::{DataUpdateService, SourceVersion, UpgradeReport};
pub use error::MigrationError;
pub use graph_rewriter::{
    proxy_node, NestedRuleNodeRewriter, RewriteStats, DEFAULT_PACK_SIZE, PROXY_SOURCE_KEY,
};
pub use migration_step::{MigrationStep, NoticeStep, PaginatedStep, StepReport};
