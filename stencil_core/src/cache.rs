use crate::error::TemplateError;
use crate::query::QueryMap;
use crate::template::PathTemplate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A raw URL template split into its compiled path and parsed query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedUrl {
    raw: String,
    path: PathTemplate,
    query: QueryMap,
}

impl ParsedUrl {
    /// Splits on the first `?`; a `#fragment` suffix is dropped.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let target = raw.split_once('#').map_or(raw, |(head, _)| head);
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Ok(Self {
            raw: raw.to_owned(),
            path: PathTemplate::compile(path)?,
            query: QueryMap::parse(query)?,
        })
    }

    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn path(&self) -> &PathTemplate {
        &self.path
    }

    #[inline]
    pub fn query(&self) -> &QueryMap {
        &self.query
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    /// Lookups that parsed. Racing first lookups of one key each count once.
    pub misses: u64,
}

/// Memoizes [`ParsedUrl`] by exact raw template string.
///
/// Concurrency:
/// - lookups share a read lock; parsing runs with no lock held;
/// - the result is published under the write lock with entry-or-insert, so racing first
///   lookups all return the one stored `Arc`;
/// - entries are immutable and never evicted; failed parses are never stored.
#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<String, Arc<ParsedUrl>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, raw: &str) -> Result<Arc<ParsedUrl>, TemplateError> {
        if let Some(hit) = self.get(raw) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(template = raw, "template cache hit");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let parsed = ParsedUrl::parse(raw).inspect_err(|e| {
            tracing::debug!(template = raw, error = %e, "template rejected");
        })?;

        let mut entries = self.entries.write();
        let stored = Arc::clone(
            entries
                .entry(raw.to_owned())
                .or_insert_with(|| Arc::new(parsed)),
        );
        tracing::trace!(template = raw, entries = entries.len(), "template cached");
        Ok(stored)
    }

    /// Lookup only: never parses, never touches the counters.
    pub fn get(&self, raw: &str) -> Option<Arc<ParsedUrl>> {
        self.entries.read().get(raw).cloned()
    }

    #[inline]
    pub fn contains(&self, raw: &str) -> bool {
        self.entries.read().contains_key(raw)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("TemplateCache")
            .field("entries", &stats.entries)
            .field("hits", &stats.hits)
            .field("misses", &stats.misses)
            .finish()
    }
}
