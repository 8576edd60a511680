use crate::debug::DebugLevel;
use crate::error::{ApiClientError, HostInvalidReason};
use crate::query::QueryMerge;
use core::time::Duration;
use http::header::{HeaderName, HeaderValue};
use http::uri::Scheme;
use http::HeaderMap;
use serde::Deserialize;
use url::Url;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    Http,
    #[default]
    Https,
}

impl SchemeKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SchemeKind::Http => "http",
            SchemeKind::Https => "https",
        }
    }
}

impl From<SchemeKind> for Scheme {
    fn from(s: SchemeKind) -> Self {
        match s {
            SchemeKind::Http => Scheme::HTTP,
            SchemeKind::Https => Scheme::HTTPS,
        }
    }
}

/// Client-wide settings, immutable once the client is built.
///
/// Deserializable so it can live in a settings file:
/// ```toml
/// scheme = "https"
/// host = "api.example.com:8443"
/// timeout_ms = 5000
/// debug = "v"
/// query_merge = "append"
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub scheme: SchemeKind,
    /// Host, optionally with `:port`. No scheme, no path.
    pub host: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub debug: DebugLevel,
    #[serde(default)]
    pub query_merge: QueryMerge,
    #[serde(skip)]
    pub default_headers: HeaderMap,
}

impl ClientConfig {
    pub fn new(scheme: SchemeKind, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            timeout_ms: None,
            debug: DebugLevel::default(),
            query_merge: QueryMerge::default(),
            default_headers: HeaderMap::new(),
        }
    }

    #[inline]
    pub fn https(host: impl Into<String>) -> Self {
        Self::new(SchemeKind::Https, host)
    }

    #[inline]
    pub fn http(host: impl Into<String>) -> Self {
        Self::new(SchemeKind::Http, host)
    }

    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    #[inline]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug = level;
        self
    }

    #[inline]
    pub fn with_query_merge(mut self, merge: QueryMerge) -> Self {
        self.query_merge = merge;
        self
    }

    #[inline]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ApiClientError> {
        let h = self.host.as_str();
        let reason = if h.is_empty() {
            Some(HostInvalidReason::Empty)
        } else if h.contains("://") {
            Some(HostInvalidReason::ContainsScheme)
        } else if h.chars().any(char::is_whitespace) {
            Some(HostInvalidReason::ContainsWhitespace)
        } else if h.contains('/') {
            Some(HostInvalidReason::ContainsSlash)
        } else {
            h.chars()
                .find(|c| matches!(c, '?' | '#' | '@'))
                .map(HostInvalidReason::ContainsDelimiter)
        };
        match reason {
            Some(reason) => Err(ApiClientError::InvalidHost {
                host: self.host.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// `scheme://host/`, validated.
    pub fn base_url(&self) -> Result<Url, ApiClientError> {
        self.validate()?;
        Ok(Url::parse(&format!("{}://{}", self.scheme.as_str(), self.host))?)
    }
}
