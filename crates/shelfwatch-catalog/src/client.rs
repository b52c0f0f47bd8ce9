//! Catalog snapshot fetches over the managed session.

use std::sync::Arc;

use shelfwatch_core::error::{Result, ShelfwatchError};
use shelfwatch_core::types::{CatalogPage, Item};

use crate::session::SessionManager;

/// Bulk read of the tracked category, mirroring the storefront frontend's
/// own query. The upstream returns only actively listed items, so absence
/// from this page is itself a signal downstream.
const PRODUCTS_QUERY: &str = "/api/1/entity/ms.products?\
fields[name]=1&fields[brand]=1&fields[categories]=1&fields[collections]=1&\
fields[alias]=1&fields[sku]=1&fields[price]=1&fields[compare_price]=1&\
fields[original_price]=1&fields[images]=1&fields[metafields]=1&\
fields[discounts]=1&fields[catalog_only]=1&fields[is_catalog]=1&\
fields[seller]=1&fields[available]=1&fields[inventory_quantity]=1&\
fields[net_quantity]=1&fields[num_reviews]=1&fields[avg_rating]=1&\
fields[inventory_low_stock_quantity]=1&fields[inventory_allow_out_of_stock]=1&\
filters[0][field]=categories&filters[0][value][0]=protein&\
filters[0][operator]=in&facets=true&facetgroup=default_category_facet&\
limit=100&total=1&start=0";

const FETCH_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:137.0) Gecko/20100101 Firefox/137.0";

/// Read-only client for the upstream catalog API.
pub struct CatalogClient {
    session: Arc<SessionManager>,
    base_url: String,
}

impl CatalogClient {
    pub fn new(session: Arc<SessionManager>, base_url: &str) -> Self {
        Self {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One full snapshot of the tracked category: session validated, call
    /// spacing enforced, payload parsed. Any failure is upstream-transient
    /// and aborts the caller's cycle without touching stored state.
    pub async fn fetch_snapshot(&self, store_code: &str) -> Result<Vec<Item>> {
        self.session.ensure_session(store_code).await?;
        self.session.enforce_rate_limit().await;

        let url = format!("{}{}", self.base_url, PRODUCTS_QUERY);
        let resp = self
            .session
            .client()
            .get(&url)
            .header("User-Agent", FETCH_USER_AGENT)
            .header("Referer", format!("{}/", self.base_url))
            .header("frontend", "1")
            .send()
            .await
            .map_err(|e| ShelfwatchError::Catalog(format!("Snapshot request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ShelfwatchError::Catalog(format!(
                "Catalog API returned {}",
                resp.status()
            )));
        }

        let page: CatalogPage = resp
            .json()
            .await
            .map_err(|e| ShelfwatchError::Catalog(format!("Malformed catalog payload: {e}")))?;

        tracing::debug!("Catalog snapshot: {} items", page.data.len());
        Ok(page.data)
    }
}
