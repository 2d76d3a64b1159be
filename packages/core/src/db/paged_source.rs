//! PagedSource Trait - Paged Fetch Abstraction
//!
//! The only read contract a [`BulkUpdater`](crate::services::BulkUpdater) needs:
//! "give me page N of the entities matching this scope". Implementations may
//! be backed by offset queries, keyset cursors or an in-memory list.
//!
//! # Consistency
//!
//! Pages are not snapshots. Re-fetching the same link after an unrelated
//! write must not skip unrelated items, but nothing stronger is promised when
//! other writers mutate the matching set concurrently.

use crate::db::DatabaseError;
use crate::models::{Page, PageLink, UpdateScope};
use async_trait::async_trait;

/// Paged read access to one entity kind
#[async_trait]
pub trait PagedSource<T: Send + 'static>: Send + Sync {
    /// Fetch the page addressed by `link` among entities matching `scope`
    ///
    /// An empty page with `has_next == false` is a valid answer and ends the
    /// iteration.
    async fn fetch(&self, scope: &UpdateScope, link: &PageLink) -> Result<Page<T>, DatabaseError>;
}
