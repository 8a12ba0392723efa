//! Check-then-delete caches shared by a loader kind across calls.
//!
//! A stored value is handed out exactly once and then dropped, so a second
//! build of the same stylesheet fetches it again. Failed fetches are stored as
//! `None` and handed out the same way.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::future::Future;

/// One cache keyed by URL.
#[derive(Debug)]
pub struct CacheSlot<T> {
    name: &'static str,
    entries: Mutex<FxHashMap<String, Option<T>>>,
}

impl<T: Clone> CacheSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Return the stored value for `key` and delete it, or run `fetch` and
    /// store its result for the next caller.
    ///
    /// The lock is not held across `fetch`, two concurrent misses both fetch.
    pub async fn take_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let stored = self.entries.lock().remove(key);
        if let Some(stored) = stored {
            tracing::debug!(cache = self.name, key, "loader cache hit");
            return stored;
        }

        let fetched = fetch().await;
        self.entries.lock().insert(key.to_string(), fetched.clone());
        fetched
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Stylesheet and font file caches of one loader kind.
#[derive(Debug)]
pub struct LoaderCache {
    pub css: CacheSlot<String>,
    pub font: CacheSlot<Vec<u8>>,
}

impl Default for LoaderCache {
    fn default() -> Self {
        Self {
            css: CacheSlot::new("css"),
            font: CacheSlot::new("font"),
        }
    }
}

impl LoaderCache {
    pub fn clear(&self) {
        self.css.clear();
        self.font.clear();
    }
}
