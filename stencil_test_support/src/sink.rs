use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::sync::{Arc, Mutex};
use stencil_core::prelude::{DebugLevel, DebugSink, Format};

/// Debug sink that keeps one short line per event, for asserting what a given
/// [`DebugLevel`] emits.
#[derive(Clone, Default)]
pub struct CapturingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

impl DebugSink for CapturingSink {
    fn request_start(&self, _: DebugLevel, method: &Method, url: &str, operation: &str, attempt: u32) {
        self.push(format!("start {method} {url} {operation} attempt={attempt}"));
    }

    fn request_headers(&self, _: DebugLevel, headers: &HeaderMap) {
        self.push(format!("request_headers {}", headers.len()));
    }

    fn request_body(&self, _: DebugLevel, body: &Bytes, _: Format, _: usize) {
        self.push(format!("request_body {}", body.len()));
    }

    fn response_status(&self, _: DebugLevel, status: StatusCode, _: &str, ok: bool) {
        self.push(format!("status {} ok={ok}", status.as_u16()));
    }

    fn response_headers(&self, _: DebugLevel, headers: &HeaderMap) {
        self.push(format!("response_headers {}", headers.len()));
    }

    fn response_body(&self, _: DebugLevel, body: &Bytes, _: Format, _: usize) {
        self.push(format!("response_body {}", body.len()));
    }

    fn response_body_preview(&self, _: DebugLevel, _: &HeaderMap, body: &Bytes, _: Option<usize>) {
        self.push(format!("response_body_preview {}", body.len()));
    }
}
