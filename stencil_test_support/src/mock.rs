use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stencil_core::transport::*;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub meta: RequestMeta,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct MockReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MockReply {
    pub fn ok_json(body: Bytes) -> Self {
        Self::status(StatusCode::OK).with_body(body, "application/json")
    }

    pub fn ok_text(body: impl Into<Bytes>) -> Self {
        Self::status(StatusCode::OK).with_body(body.into(), "text/plain; charset=utf-8")
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: &'static str) -> Self {
        self.body = body.into();
        self.headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(content_type),
        );
        self
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Replays the body in fixed-size chunks so preview truncation is exercised.
struct ChunkedBody {
    rest: Bytes,
    chunk: usize,
}

impl TransportBody for ChunkedBody {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>> {
        Box::pin(async move {
            if self.rest.is_empty() {
                return Ok(None);
            }
            let n = self.rest.len().min(self.chunk);
            Ok(Some(self.rest.split_to(n)))
        })
    }
}

#[derive(Debug)]
struct MockState {
    recorded: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
    chunk: usize,
}

#[derive(Clone)]
pub struct MockTransport {
    st: Arc<MockState>,
}

pub struct MockHandle {
    st: Arc<MockState>,
    finished: bool,
}

pub struct MockBuilder {
    replies: Vec<MockReply>,
    chunk: usize,
}

impl Default for MockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBuilder {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            chunk: 4 * 1024,
        }
    }

    pub fn reply(mut self, r: MockReply) -> Self {
        self.replies.push(r);
        self
    }

    pub fn replies(mut self, rs: impl IntoIterator<Item = MockReply>) -> Self {
        self.replies.extend(rs);
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk = n.max(1);
        self
    }

    pub fn build(self) -> (MockTransport, MockHandle) {
        let st = Arc::new(MockState {
            recorded: Mutex::new(Vec::new()),
            replies: Mutex::new(self.replies.into_iter().collect()),
            chunk: self.chunk,
        });
        (
            MockTransport { st: st.clone() },
            MockHandle {
                st,
                finished: false,
            },
        )
    }
}

pub fn mock() -> MockBuilder {
    MockBuilder::new()
}

impl MockHandle {
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.st.recorded.lock().unwrap().clone()
    }

    /// The only recorded request; panics unless exactly one was sent.
    pub fn single(&self) -> RecordedRequest {
        self.assert_recorded_len(1);
        self.recorded().remove(0)
    }

    pub fn recorded_len(&self) -> usize {
        self.st.recorded.lock().unwrap().len()
    }

    pub fn assert_recorded_len(&self, expected: usize) {
        let got = self.recorded_len();
        if got != expected {
            let reqs = self.recorded();
            panic!(
                "recorded request count mismatch\n  expected: {expected}\n  got: {got}\n  recorded:\n{:#?}",
                reqs
            );
        }
    }

    pub fn remaining_replies(&self) -> usize {
        self.st.replies.lock().unwrap().len()
    }

    pub fn assert_no_remaining_replies(&self) {
        let left = self.remaining_replies();
        if left != 0 {
            panic!("mock replies not fully consumed: remaining={left}");
        }
    }

    pub fn finish(mut self) {
        self.assert_no_remaining_replies();
        self.finished = true;
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        let left = self.st.replies.lock().unwrap().len();
        if left != 0 {
            panic!("mock replies not fully consumed (drop): remaining={left}");
        }
    }
}

impl Transport for MockTransport {
    fn send<'a>(&'a self, req: &'a BuiltRequest) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            self.st.recorded.lock().unwrap().push(RecordedRequest {
                meta: req.meta.clone(),
                url: req.url.clone(),
                headers: req.headers.clone(),
                body: req.body.clone(),
                timeout: req.timeout,
            });

            let reply = self.st.replies.lock().unwrap().pop_front();
            let Some(reply) = reply else {
                return Err(TransportError::msg(format!(
                    "MockTransport: no scripted reply left for {} {}",
                    req.meta.method, req.url
                )));
            };

            Ok(TransportResponse {
                status: reply.status,
                headers: reply.headers,
                content_length: Some(reply.body.len() as u64),
                body: Box::new(ChunkedBody {
                    rest: reply.body,
                    chunk: self.st.chunk,
                }),
            })
        })
    }
}
