//! Concurrent fetching of continuation pages.
//!
//! Every page URL gets its own task; results are merged into a shared [`Collection`].
//! A page that fails to load is logged and contributes nothing.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use url::Url;

/// Thread-safe accumulator shared by concurrent writers.
#[derive(Debug)]
pub struct Collection<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Collection<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Appends `items`. The lock is only held for the in-memory extend.
    pub fn add(&self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        self.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Moves the accumulated items out, leaving the collection empty.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // Appends cannot leave the vector half-written, so a poisoned lock is still usable.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Outcome of a [`fetch_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub requested: usize,
    pub failed: usize,
}

/// Fetches every URL concurrently and merges the results into `collection`.
///
/// Returns only once every spawned task has finished. Dropping the returned future
/// aborts the tasks still in flight.
pub async fn fetch_all<T, F, Fut>(
    urls: Vec<Url>,
    collection: &Arc<Collection<T>>,
    fetch: F,
) -> FetchSummary
where
    T: Send + 'static,
    F: Fn(Url) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    for url in urls {
        let collection = Arc::clone(collection);
        let page = fetch(url.clone());
        tasks.spawn(async move {
            match page.await {
                Ok(items) => {
                    collection.add(items);
                    true
                }
                Err(e) => {
                    tracing::debug!(%url, "Error fetching page: {:#}", e);
                    false
                }
            }
        });
    }

    let mut summary = FetchSummary {
        requested: tasks.len(),
        failed: 0,
    };

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(true) => {}
            Ok(false) => summary.failed += 1,
            Err(e) => {
                tracing::error!("Page fetch task did not complete: {}", e);
                summary.failed += 1;
            }
        }
    }

    summary
}
