use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Debug)]
pub struct RequestMeta {
    /// Caller supplied operation name; defaults to the raw template.
    pub operation: String,
    pub template: String,
    pub method: Method,
    pub idempotent: bool,
    pub attempt: u32,
}

/// Fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct BuiltRequest {
    pub meta: RequestMeta,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct RawResponse {
    pub meta: RequestMeta,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Debug)]
pub struct DecodedResponse<T> {
    pub meta: RequestMeta,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub value: T,
}

#[derive(Debug)]
pub struct TransportError(crate::error::FxError);

impl TransportError {
    #[inline]
    pub fn new(e: impl Error + Send + Sync + 'static) -> Self {
        Self(Box::new(e))
    }

    #[inline]
    pub fn msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self(msg.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.0)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e)
    }
}

pub trait TransportBody: Send + 'static {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>>;
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    pub body: Box<dyn TransportBody>,
}

/// Injectable transport layer.
///
/// Contract:
/// - Must honor `BuiltRequest` fields (method/url/headers/body/timeout).
/// - Must not leak a concrete HTTP client type in its public surface.
pub trait Transport: Send + Sync + 'static {
    fn send<'a>(&'a self, req: &'a BuiltRequest) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[inline]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

struct ReqwestBody {
    resp: reqwest::Response,
}

impl TransportBody for ReqwestBody {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>> {
        Box::pin(async move { self.resp.chunk().await.map_err(TransportError::from) })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, req: &'a BuiltRequest) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let mut rb = self
                .client
                .request(req.meta.method.clone(), req.url.clone())
                .headers(req.headers.clone());
            if let Some(body) = &req.body {
                rb = rb.body(body.clone());
            }
            if let Some(t) = req.timeout {
                rb = rb.timeout(t);
            }
            let resp = rb.send().await?;
            Ok(TransportResponse {
                status: resp.status(),
                headers: resp.headers().clone(),
                content_length: resp.content_length(),
                body: Box::new(ReqwestBody { resp }),
            })
        })
    }
}

/// Reads at most `max` bytes of a body.
pub(crate) async fn read_body_preview(body: &mut dyn TransportBody, max: usize) -> Result<Bytes, TransportError> {
    let mut buf = bytes::BytesMut::with_capacity(max.min(8 * 1024));
    while buf.len() < max {
        let Some(chunk) = body.next_chunk().await? else {
            break;
        };
        let remaining = max - buf.len();
        buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
    }
    Ok(buf.freeze())
}

pub(crate) async fn read_body_all(body: &mut dyn TransportBody) -> Result<Bytes, TransportError> {
    let mut buf = bytes::BytesMut::with_capacity(8 * 1024);
    while let Some(chunk) = body.next_chunk().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
