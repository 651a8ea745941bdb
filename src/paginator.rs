//! Planning and running the continuation requests of a paginated listing.

use crate::fetcher::{self, Collection};
use crate::github::Page;
use std::future::Future;
use std::sync::Arc;
use url::Url;

/// Quota assumed when the upstream did not report one (GitHub's anonymous hourly limit).
pub const DEFAULT_RATE_LIMIT_REMAINING: u32 = 60;

const PAGE_PARAM: &str = "page";

/// Reads the page number out of a `rel="last"` link.
pub fn last_page_number(link: &Url) -> Option<u32> {
    link.query_pairs()
        .find(|(key, _)| key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}

/// URLs for pages `2..=total`, derived from the first request's URL.
pub fn remaining_page_urls(origin: &Url, total: u32) -> Vec<Url> {
    (2..=total).map(|page| with_page(origin, page)).collect()
}

fn with_page(origin: &Url, page: u32) -> Url {
    let pairs: Vec<(String, String)> = origin
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != PAGE_PARAM)
        .collect();

    let mut url = origin.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(PAGE_PARAM, &page.to_string());
    url
}

/// Completes a listing whose first page has already been fetched.
///
/// Pages `2..=N` are fetched concurrently through `fetch`. When the remaining rate-limit
/// quota does not cover the whole listing, only the first page's items are returned.
/// Pages that fail are dropped; the rest still contribute.
pub async fn collect_pages<T, F, Fut>(request_url: &Url, first: Page<T>, fetch: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(Url) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    let Page {
        items,
        rate_limit_remaining,
        last,
    } = first;

    let Some(total) = last.as_ref().and_then(last_page_number) else {
        return items;
    };

    let remaining = rate_limit_remaining.unwrap_or(DEFAULT_RATE_LIMIT_REMAINING);
    if remaining <= total {
        tracing::warn!(
            url = %request_url,
            remaining,
            total_pages = total,
            "Rate limit too low to paginate, metrics only cover the first page"
        );
        return items;
    }

    let urls = remaining_page_urls(request_url, total);
    let collection = Arc::new(Collection::new(items));
    let summary = fetcher::fetch_all(urls, &collection, fetch).await;

    if summary.failed > 0 {
        tracing::warn!(
            url = %request_url,
            failed = summary.failed,
            requested = summary.requested,
            "Some pages could not be fetched, metrics are incomplete"
        );
    }

    collection.take()
}
