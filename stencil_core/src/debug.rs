use crate::codec::{self, Format};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DebugLevel {
    #[default]
    None = 0,
    V = 1,
    VV = 2,
}

impl DebugLevel {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self != DebugLevel::None
    }

    #[inline]
    pub fn is_verbose(self) -> bool {
        self >= DebugLevel::V
    }

    #[inline]
    pub fn is_very_verbose(self) -> bool {
        self >= DebugLevel::VV
    }
}

impl core::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DebugLevel::None => f.write_str("none"),
            DebugLevel::V => f.write_str("v"),
            DebugLevel::VV => f.write_str("vv"),
        }
    }
}

/// Receives request/response diagnostics. The client only calls a sink when the
/// effective [`DebugLevel`] asks for that detail.
pub trait DebugSink: Send + Sync + 'static {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, operation: &str, attempt: u32);
    fn request_headers(&self, dbg: DebugLevel, headers: &HeaderMap);
    fn request_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize);

    fn response_status(&self, dbg: DebugLevel, status: StatusCode, url: &str, ok: bool);
    fn response_headers(&self, dbg: DebugLevel, headers: &HeaderMap);
    fn response_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize);
    fn response_body_preview(&self, dbg: DebugLevel, headers: &HeaderMap, body: &Bytes, full_len: Option<usize>);
}

#[derive(Default)]
pub struct NoopDebugSink;
impl DebugSink for NoopDebugSink {
    #[inline]
    fn request_start(&self, _: DebugLevel, _: &Method, _: &str, _: &str, _: u32) {}
    #[inline]
    fn request_headers(&self, _: DebugLevel, _: &HeaderMap) {}
    #[inline]
    fn request_body(&self, _: DebugLevel, _: &Bytes, _: Format, _: usize) {}
    #[inline]
    fn response_status(&self, _: DebugLevel, _: StatusCode, _: &str, _: bool) {}
    #[inline]
    fn response_headers(&self, _: DebugLevel, _: &HeaderMap) {}
    #[inline]
    fn response_body(&self, _: DebugLevel, _: &Bytes, _: Format, _: usize) {}
    #[inline]
    fn response_body_preview(&self, _: DebugLevel, _: &HeaderMap, _: &Bytes, _: Option<usize>) {}
}

/// Plain `[stencil:v] -> GET url (operation)` lines on stderr.
#[derive(Default)]
pub struct StderrDebugSink;
impl DebugSink for StderrDebugSink {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, operation: &str, attempt: u32) {
        if attempt == 0 {
            eprintln!("[stencil:{}] -> {} {} ({})", dbg, method, url, operation);
        } else {
            eprintln!(
                "[stencil:{}] -> {} {} ({}) attempt={}",
                dbg, method, url, operation, attempt
            );
        }
    }

    fn request_headers(&self, dbg: DebugLevel, headers: &HeaderMap) {
        eprintln!("[stencil:{}] request headers:", dbg);
        for (k, v) in headers.iter() {
            eprintln!("  {}: {}", k, header_value_for_debug(k, v));
        }
    }

    fn request_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        eprintln!("[stencil:{}] request body ({} bytes): {}", dbg, body.len(), preview);
    }

    fn response_status(&self, dbg: DebugLevel, status: StatusCode, url: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        eprintln!("[stencil:{}] <- {} {} ({})", dbg, status.as_u16(), url, outcome);
    }

    fn response_headers(&self, dbg: DebugLevel, headers: &HeaderMap) {
        eprintln!("[stencil:{}] response headers:", dbg);
        for (k, v) in headers.iter() {
            eprintln!("  {}: {}", k, header_value_for_debug(k, v));
        }
    }

    fn response_body(&self, dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        eprintln!("[stencil:{}] response body ({} bytes): {}", dbg, body.len(), preview);
    }

    fn response_body_preview(&self, dbg: DebugLevel, headers: &HeaderMap, body: &Bytes, full_len: Option<usize>) {
        let preview = crate::error::body_as_text(headers, body, full_len);
        eprintln!("[stencil:{}] response body preview: {}", dbg, preview);
    }
}

/// Emits the same diagnostics as `tracing` events under the `stencil` target.
#[derive(Default)]
pub struct TracingDebugSink;
impl DebugSink for TracingDebugSink {
    fn request_start(&self, dbg: DebugLevel, method: &Method, url: &str, operation: &str, attempt: u32) {
        tracing::debug!(target: "stencil", level = %dbg, %method, url, operation, attempt, "request");
    }

    fn request_headers(&self, _dbg: DebugLevel, headers: &HeaderMap) {
        for (k, v) in headers.iter() {
            tracing::trace!(target: "stencil", header = %k, value = %header_value_for_debug(k, v), "request header");
        }
    }

    fn request_body(&self, _dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        tracing::trace!(target: "stencil", bytes = body.len(), body = %preview, "request body");
    }

    fn response_status(&self, _dbg: DebugLevel, status: StatusCode, url: &str, ok: bool) {
        if ok {
            tracing::debug!(target: "stencil", status = status.as_u16(), url, "response");
        } else {
            tracing::warn!(target: "stencil", status = status.as_u16(), url, "error response");
        }
    }

    fn response_headers(&self, _dbg: DebugLevel, headers: &HeaderMap) {
        for (k, v) in headers.iter() {
            tracing::trace!(target: "stencil", header = %k, value = %header_value_for_debug(k, v), "response header");
        }
    }

    fn response_body(&self, _dbg: DebugLevel, body: &Bytes, format: Format, max_chars: usize) {
        let preview = codec::format_bytes_for_debug(format, body.as_ref(), max_chars);
        tracing::trace!(target: "stencil", bytes = body.len(), body = %preview, "response body");
    }

    fn response_body_preview(&self, _dbg: DebugLevel, headers: &HeaderMap, body: &Bytes, full_len: Option<usize>) {
        let preview = crate::error::body_as_text(headers, body, full_len);
        tracing::trace!(target: "stencil", body = %preview, "error response body");
    }
}

fn is_sensitive_header_name(name: &HeaderName) -> bool {
    // HeaderName::as_str() is lowercase.
    let n = name.as_str();
    matches!(n, "authorization" | "proxy-authorization" | "cookie" | "set-cookie")
        || n.contains("token")
        || n.contains("secret")
        || n.contains("api-key")
        || n.contains("apikey")
        || n.ends_with("-key")
}

pub(crate) fn header_value_for_debug(name: &HeaderName, value: &HeaderValue) -> String {
    if is_sensitive_header_name(name) {
        "<redacted>".to_string()
    } else {
        value.to_str().unwrap_or("<non-utf8>").to_string()
    }
}
