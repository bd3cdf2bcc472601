// harvester-core/src/ports/source.rs

// What the extraction loop needs from an upstream database, without knowing which one.

use crate::domain::dataset::Dataset;
use crate::error::HarvestError;
use async_trait::async_trait;

/// One page of a rendered query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub source: String,
    pub sql: String,
    pub offset: usize,
    pub limit: usize,
}

#[async_trait]
pub trait ExtractionSource: Send + Sync {
    /// Rows `offset..offset+limit` of `sql`. The SQL already carries the paging
    /// clause; `offset` and `limit` are what it was rendered with.
    ///
    /// Column names must be stable across pages, even when the page is empty.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Dataset, HarvestError>;

    /// Every row of `sql`, unpaged. Used for reference data.
    async fn fetch_all(&self, sql: &str) -> Result<Dataset, HarvestError>;
}
