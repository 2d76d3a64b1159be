//! Pagination Primitives
//!
//! `PageLink` is the continuation token handed to a [`PagedSource`](crate::db::PagedSource);
//! `Page` is what comes back. Pages are not stable snapshots: if the underlying
//! set changes between fetches, later pages reflect the new state.

use crate::models::ids::TenantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    pub page: usize,
    pub page_size: usize,
}

impl PageLink {
    pub fn new(page_size: usize) -> Self {
        Self { page: 0, page_size }
    }

    pub fn next_page_link(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }

    /// Index of the first item covered by this link
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_elements: 0,
            total_pages: 0,
            has_next: false,
        }
    }

    /// Slice one page out of a fully materialized, ordered result set
    pub fn from_slice(items: &[T], link: &PageLink) -> Self
    where
        T: Clone,
    {
        let total_elements = items.len();
        if link.page_size == 0 {
            return Self {
                total_elements,
                ..Self::empty()
            };
        }
        let total_pages = total_elements.div_ceil(link.page_size);
        let start = link.offset().min(total_elements);
        let end = start.saturating_add(link.page_size).min(total_elements);
        Self {
            data: items[start..end].to_vec(),
            total_elements,
            total_pages,
            has_next: end < total_elements,
        }
    }
}

/// Which slice of the dataset an updater walks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateScope {
    #[default]
    All,
    /// Deployment region; single-region stores treat this like `All`
    Region(String),
    Tenant(TenantId),
}

impl UpdateScope {
    pub fn includes_tenant(&self, tenant_id: &TenantId) -> bool {
        match self {
            UpdateScope::Tenant(scoped) => scoped == tenant_id,
            UpdateScope::All | UpdateScope::Region(_) => true,
        }
    }
}
