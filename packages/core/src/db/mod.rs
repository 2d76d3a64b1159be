//! Storage Layer
//!
//! The upgrade never talks to a database directly. Everything it reads or
//! writes goes through the collaborator traits defined here:
//!
//! - [`PagedSource`] - paged fetch of one entity kind
//! - [`RelationStore`] - relation edge queries and idempotent insert/delete
//! - [`RuleChainStore`] / [`RuleChainTemplates`] - rule chain graph access and
//!   default chain seeding
//! - [`AlarmStore`], [`DeviceProfileStore`], [`CustomerLookup`],
//!   [`TimeseriesStore`] - point writes and lookups used by individual steps
//!
//! [`InMemoryStore`] implements all of them over a JSON-serializable snapshot.

mod entity_stores;
mod error;
pub mod memory_store;
mod paged_source;
mod relation_store;
mod rule_chain_store;

pub use entity_stores::{AlarmStore, CustomerLookup, DeviceProfileStore, TimeseriesStore};
pub use error::DatabaseError;
pub use memory_store::{InMemoryStore, StoreSnapshot, StoredRelation, TsRecord};
pub use paged_source::PagedSource;
pub use relation_store::RelationStore;
pub use rule_chain_store::{RuleChainStore, RuleChainTemplates};
