// src/fetch.rs
//! Territory and house-listing retrieval.
//!
//! Pages come back raw and in page order; flattening is the normalizer's job.
//!
//! Looped paging relies on the API applying the filter's `sortBy`/`sortAsc`
//! consistently across requests. The fetcher holds the sort constant but
//! cannot detect a backend that ignores it.

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::PagePolicy;
use crate::config::consts::SINGLE_SHOT_LIMIT;
use crate::core::net::Transport;
use crate::error::{Error, Result};
use crate::filter::RequestFilter;
use crate::normalize::page_items;
use crate::progress::Progress;
use crate::session::SessionClient;

pub struct PaginatedFetcher<'s, T: Transport> {
    session: &'s SessionClient<T>,
    territories_url: String,
    houses_url: String,
}

impl<'s, T: Transport> PaginatedFetcher<'s, T> {
    pub fn new(session: &'s SessionClient<T>, territories_url: &str, houses_url: &str) -> Self {
        Self {
            session,
            territories_url: territories_url.to_string(),
            houses_url: houses_url.to_string(),
        }
    }

    /// One POST; the territories report is not paged.
    pub fn fetch_territories(&self, filter: &RequestFilter) -> Result<Value> {
        let payload = serde_json::to_value(filter)?;
        let data = self.session.post_json(&self.territories_url, &payload)?;
        debug!("Territories payload received from {}", self.territories_url);
        Ok(data)
    }

    /// Raw house-listing pages, in page order.
    pub fn fetch_house_pages(
        &self,
        filter: &RequestFilter,
        policy: PagePolicy,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> Result<Vec<Value>> {
        match policy {
            PagePolicy::SingleShot { max_items } => {
                if max_items == 0 || max_items > SINGLE_SHOT_LIMIT {
                    return Err(Error::Config(format!(
                        "single-shot page size {max_items} outside 1..={SINGLE_SHOT_LIMIT}; use looped paging"
                    )));
                }
                let page = self.fetch_page(filter, 1, max_items)?;
                let n = page_items(&page)?.len();
                if n as u32 >= max_items {
                    warn!("Single-shot page came back full ({n}); the result set may be larger than {max_items}");
                }
                if let Some(p) = progress.as_deref_mut() {
                    p.log(&format!("Houses: 1 page, {n} item(s)"));
                }
                Ok(vec![page])
            }
            PagePolicy::Looped { page_size, max_pages } => {
                if page_size == 0 || max_pages == 0 {
                    return Err(Error::Config("page_size and max_pages must be positive".into()));
                }
                if !filter.is_sorted() {
                    warn!("Looped paging without sortBy/sortAsc; page boundaries may shift between requests");
                }

                let mut pages = Vec::new();
                let mut total = 0usize;
                for number in 1..=max_pages {
                    let page = self.fetch_page(filter, number, page_size)?;
                    let n = page_items(&page)?.len();
                    total += n;
                    pages.push(page);
                    if let Some(p) = progress.as_deref_mut() {
                        p.log(&format!("Houses: page {number}, {n} item(s), {total} so far"));
                    }
                    if n < page_size as usize {
                        break;
                    }
                    if number == max_pages {
                        warn!("Stopped at max_pages={max_pages}; listing may continue past {total} item(s)");
                    }
                }
                info!("House listing: {} page(s), {total} item(s)", pages.len());
                Ok(pages)
            }
        }
    }

    fn fetch_page(&self, filter: &RequestFilter, number: u32, size: u32) -> Result<Value> {
        let payload = serde_json::to_value(filter.page(number, size))?;
        self.session.post_json(&self.houses_url, &payload)
    }
}

/// Concatenate the `items` of every page, in order.
pub fn house_items(pages: &[Value]) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for page in pages {
        out.extend_from_slice(page_items(page)?);
    }
    Ok(out)
}
