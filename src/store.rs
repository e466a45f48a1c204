//! In-memory store of rendered pages with optional LRU eviction

use lru::LruCache;

use crate::types::{CacheEntry, PageNumber};

/// Page number → rendered page. One entry per page.
pub struct RasterStore {
    entries: LruCache<PageNumber, CacheEntry>,
    capacity: Option<usize>,
}

impl RasterStore {
    /// Create a store; `None` keeps every page until the next flush
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    /// Look up a page without touching the LRU order
    #[must_use]
    pub fn get(&self, page: PageNumber) -> Option<&CacheEntry> {
        self.entries.peek(&page)
    }

    #[must_use]
    pub fn contains(&self, page: PageNumber) -> bool {
        self.entries.contains(&page)
    }

    /// Mark a page as most recently used
    pub fn touch(&mut self, page: PageNumber) {
        self.entries.promote(&page);
    }

    /// Insert a page, replacing any older entry for it.
    ///
    /// When over capacity, evicts least recently used pages for which
    /// `pinned` returns false. Returns the evicted page numbers.
    pub fn insert(
        &mut self,
        entry: CacheEntry,
        pinned: impl Fn(PageNumber) -> bool,
    ) -> Vec<PageNumber> {
        let page = entry.page;
        self.entries.put(page, entry);

        let Some(capacity) = self.capacity else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        while self.entries.len() > capacity {
            let victim = self
                .entries
                .iter()
                .rev()
                .map(|(p, _)| *p)
                .find(|p| *p != page && !pinned(*p));
            match victim {
                Some(p) => {
                    self.entries.pop(&p);
                    evicted.push(p);
                }
                // everything else is pinned
                None => break,
            }
        }
        evicted
    }

    /// Drop every entry
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Cached page numbers in ascending order
    #[must_use]
    pub fn pages(&self) -> Vec<PageNumber> {
        let mut pages: Vec<_> = self.entries.iter().map(|(p, _)| *p).collect();
        pages.sort_unstable();
        pages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
