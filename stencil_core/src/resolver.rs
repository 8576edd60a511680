use crate::cache::{ParsedUrl, TemplateCache};
use crate::error::ResolutionError;
use crate::query::{QueryMap, QueryMerge};
use crate::template::PathParams;
use std::fmt;
use std::sync::Arc;

/// Rendered path plus the effective query (template query merged with overrides).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    pub query: QueryMap,
}

impl ResolvedPath {
    /// Encoded query, `None` when there is nothing to send.
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            None
        } else {
            Some(self.query.encode())
        }
    }

    pub fn path_and_query(&self) -> String {
        match self.query_string() {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_and_query())
    }
}

/// Entry point of the template engine: cached parsing and rendering.
#[derive(Debug, Default)]
pub struct UrlResolver {
    cache: TemplateCache,
    merge: QueryMerge,
}

impl UrlResolver {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_merge(merge: QueryMerge) -> Self {
        Self {
            cache: TemplateCache::new(),
            merge,
        }
    }

    #[inline]
    pub fn merge_policy(&self) -> QueryMerge {
        self.merge
    }

    #[inline]
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn parse(&self, raw: &str) -> Result<Arc<ParsedUrl>, ResolutionError> {
        self.cache
            .resolve(raw)
            .map_err(|e| ResolutionError::new(raw, e))
    }

    pub fn render(
        &self,
        raw: &str,
        params: &PathParams,
        overrides: &QueryMap,
    ) -> Result<ResolvedPath, ResolutionError> {
        self.render_with(raw, params, overrides, self.merge)
    }

    pub fn render_with(
        &self,
        raw: &str,
        params: &PathParams,
        overrides: &QueryMap,
        merge: QueryMerge,
    ) -> Result<ResolvedPath, ResolutionError> {
        let parsed = self.parse(raw)?;
        let path = parsed
            .path()
            .render(params)
            .map_err(|e| ResolutionError::new(raw, e))?;
        Ok(ResolvedPath {
            path,
            query: parsed.query().merged(overrides, merge),
        })
    }
}
