use crate::client::{RestClient, decode_response};
use crate::codec::text::Text;
use crate::codec::{Binary, ContentType, Decodes, Encodes, Format, FormatType};
use crate::debug::DebugLevel;
use crate::error::ApiClientError;
use crate::query::{QueryMap, QueryMerge};
use crate::template::PathParams;
use crate::timeout::TimeoutOverride;
use crate::transport::{BoxFuture, BuiltRequest, DecodedResponse, RawResponse, RequestMeta, Transport};
use bytes::Bytes;
use core::future::IntoFuture;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::time::Duration;

fn is_idempotent(m: &Method) -> bool {
    matches!(
        *m,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

struct Body {
    bytes: Bytes,
    content_type: Option<HeaderValue>,
    format: Format,
}

/// One request against a path template, assembled fluently and sent with
/// [`send`](Self::send), [`execute`](Self::execute) or `.await`.
///
/// Builder errors (e.g. a body that fails to encode) are held back and returned
/// when the request is built.
pub struct PendingRequest<'a, T: Transport> {
    client: &'a RestClient<T>,
    method: Method,
    template: String,
    operation: Option<String>,
    params: PathParams,
    query: QueryMap,
    merge: Option<QueryMerge>,
    headers: HeaderMap,
    body: Option<Body>,
    timeout_override: TimeoutOverride,
    debug_level: Option<DebugLevel>,
    attempt: u32,
    deferred: Option<ApiClientError>,
}

impl<'a, T: Transport> PendingRequest<'a, T> {
    pub(crate) fn new(client: &'a RestClient<T>, method: Method, template: String) -> Self {
        Self {
            client,
            method,
            template,
            operation: None,
            params: PathParams::new(),
            query: QueryMap::new(),
            merge: None,
            headers: HeaderMap::new(),
            body: None,
            timeout_override: TimeoutOverride::Inherit,
            debug_level: None,
            attempt: 0,
            deferred: None,
        }
    }

    /// Binds `{name}` in the path template. The value is percent-encoded on render.
    #[inline]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name, value);
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.params.extend(params);
        self
    }

    /// Adds a query override. Repeated keys accumulate.
    #[inline]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.append(key, value.to_string());
        self
    }

    #[inline]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Merge policy for this request only; defaults to the client's.
    #[inline]
    pub fn query_merge(mut self, merge: QueryMerge) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Sets a header, replacing any client default of the same name.
    #[inline]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[inline]
    pub fn append_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Name reported in errors and diagnostics. Defaults to the raw template.
    #[inline]
    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(name.into());
        self
    }

    pub fn encoded<E, B>(mut self, body: &B) -> Self
    where
        E: Encodes<B>,
        B: ?Sized,
    {
        match E::encode(body) {
            Ok(bytes) => {
                let ct = <E as ContentType>::CONTENT_TYPE;
                self.body = Some(Body {
                    bytes,
                    content_type: (!ct.is_empty()).then(|| HeaderValue::from_static(ct)),
                    format: <E as FormatType>::FORMAT_TYPE,
                });
            }
            Err(e) => self.deferred = Some(ApiClientError::codec_error(e)),
        }
        self
    }

    #[cfg(feature = "json")]
    #[inline]
    pub fn json<B: serde::Serialize + ?Sized>(self, body: &B) -> Self {
        self.encoded::<crate::codec::json::Json, B>(body)
    }

    #[inline]
    pub fn text(self, body: impl AsRef<str>) -> Self {
        self.encoded::<Text, str>(body.as_ref())
    }

    /// Raw payload; `content_type` defaults to `application/octet-stream`.
    pub fn body(mut self, body: impl Into<Bytes>, content_type: Option<HeaderValue>) -> Self {
        self.body = Some(Body {
            bytes: body.into(),
            content_type: Some(
                content_type
                    .unwrap_or_else(|| HeaderValue::from_static(<Binary as ContentType>::CONTENT_TYPE)),
            ),
            format: Format::Binary,
        });
        self
    }

    #[inline]
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout_override = TimeoutOverride::Set(d);
        self
    }

    #[inline]
    pub fn clear_timeout(mut self) -> Self {
        self.timeout_override = TimeoutOverride::Clear;
        self
    }

    #[inline]
    pub fn inherit_timeout(mut self) -> Self {
        self.timeout_override = TimeoutOverride::Inherit;
        self
    }

    #[inline]
    pub fn debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = Some(level);
        self
    }

    #[inline]
    pub fn attempt(mut self, v: u32) -> Self {
        self.attempt = v;
        self
    }

    #[inline]
    fn operation_name(&self) -> &str {
        self.operation.as_deref().unwrap_or(&self.template)
    }

    /// Resolves the URL and assembles headers, body and timeout without sending.
    pub fn build(self) -> Result<BuiltRequest, ApiClientError> {
        let operation = self.operation_name().to_owned();
        self.build_inner(operation.clone())
            .map_err(|e| ApiClientError::in_operation(&operation, e))
    }

    fn build_inner(self, operation: String) -> Result<BuiltRequest, ApiClientError> {
        if let Some(e) = self.deferred {
            return Err(e);
        }
        let client = self.client;
        let resolver = client.resolver();
        let merge = self.merge.unwrap_or(resolver.merge_policy());
        let resolved = resolver.render_with(&self.template, &self.params, &self.query, merge)?;
        let url = client.target_url(&resolved);

        let config = client.config();
        let mut headers = config.default_headers.clone();
        for name in self.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in self.headers.iter() {
            headers.append(name.clone(), value.clone());
        }

        let body = match self.body {
            Some(b) => {
                if let Some(ct) = b.content_type {
                    if !headers.contains_key(CONTENT_TYPE) {
                        headers.insert(CONTENT_TYPE, ct);
                    }
                }
                Some(b.bytes)
            }
            None => None,
        };

        Ok(BuiltRequest {
            meta: RequestMeta {
                operation,
                template: self.template,
                idempotent: is_idempotent(&self.method),
                method: self.method,
                attempt: self.attempt,
            },
            url,
            headers,
            body,
            timeout: self.timeout_override.apply(config.timeout()),
        })
    }

    async fn dispatch(self, response_format: Format) -> Result<RawResponse, ApiClientError> {
        let client = self.client;
        let dbg = self.debug_level.unwrap_or(client.debug_level());
        let request_format = self.body.as_ref().map_or(Format::Text, |b| b.format);
        let operation = self.operation_name().to_owned();
        let built = self.build()?;
        client
            .execute_built(built, dbg, request_format, response_format)
            .await
            .map_err(|e| ApiClientError::in_operation(&operation, e))
    }

    /// Sends and returns the undecoded 2xx response. Non-2xx becomes `HttpStatus`.
    #[inline]
    pub async fn send(self) -> Result<RawResponse, ApiClientError> {
        self.dispatch(Format::Text).await
    }

    #[inline]
    pub async fn execute<D, V>(self) -> Result<V, ApiClientError>
    where
        D: Decodes<V>,
    {
        Ok(self.execute_decoded::<D, V>().await?.value)
    }

    /// Sends, then decodes with `D`. Adds `Accept: D::CONTENT_TYPE` unless the
    /// request already sets one.
    pub async fn execute_decoded<D, V>(mut self) -> Result<DecodedResponse<V>, ApiClientError>
    where
        D: Decodes<V>,
    {
        let accept = <D as ContentType>::CONTENT_TYPE;
        if !accept.is_empty() && self.method != Method::HEAD && !self.headers.contains_key(ACCEPT) {
            self.headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }
        let operation = self.operation_name().to_owned();
        let resp = self.dispatch(<D as FormatType>::FORMAT_TYPE).await?;
        decode_response::<D, V>(resp).map_err(|e| ApiClientError::in_operation(&operation, e))
    }
}

impl<'a, T: Transport> IntoFuture for PendingRequest<'a, T> {
    type Output = Result<RawResponse, ApiClientError>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}
