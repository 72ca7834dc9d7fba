//! Page-count discovery
//!
//! One metadata request for page 1 yields the total item count; the page count
//! follows from the page size. There is no retry here: without a page count
//! the run cannot be bounded, so failure is fatal.

use tracing::info;

use crate::fetcher::{FetcherError, FetcherResult, PageSource};
use crate::{CatalogQuery, FetchRequest};

/// Totals learned from the metadata request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    /// Items across the whole catalog slice
    pub total_items: u64,
    /// Pages needed at the configured page size
    pub total_pages: u32,
}

impl PageCount {
    /// Derive the page count for `total_items` at `per_page` items per page.
    pub fn from_total(total_items: u64, per_page: u32) -> FetcherResult<Self> {
        if per_page == 0 {
            return Err(FetcherError::InvalidResponse(
                "page size must be positive".to_string(),
            ));
        }
        let pages = total_items.div_ceil(u64::from(per_page));
        let total_pages = u32::try_from(pages).map_err(|_| {
            FetcherError::InvalidResponse(format!("page count {pages} is out of range"))
        })?;

        Ok(Self {
            total_items,
            total_pages,
        })
    }
}

/// Resolves the total page count for a query.
pub struct PageCountResolver<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: PageSource + ?Sized> PageCountResolver<'a, S> {
    /// Resolve through `source`.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Issue the metadata request and compute the page count.
    pub async fn resolve(&self, query: &CatalogQuery) -> FetcherResult<PageCount> {
        let request = FetchRequest::new(1, query.clone());
        let page = self.source.fetch_page(&request).await?;

        let total = page.total_items().ok_or_else(|| {
            FetcherError::InvalidResponse("response has no usable meta.total".to_string())
        })?;
        let count = PageCount::from_total(total, query.per_page)?;

        info!(
            total_items = count.total_items,
            total_pages = count.total_pages,
            "Total products: {}  |  Pages: {}",
            count.total_items,
            count.total_pages
        );
        Ok(count)
    }
}
