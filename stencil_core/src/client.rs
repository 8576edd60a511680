use crate::cache::CacheStats;
use crate::codec::{ContentType, Decodes, Format};
use crate::config::ClientConfig;
use crate::debug::{DebugLevel, DebugSink, StderrDebugSink};
use crate::error::{ApiClientError, body_as_text};
use crate::query::QueryMap;
use crate::request::PendingRequest;
use crate::resolver::{ResolvedPath, UrlResolver};
use crate::template::PathParams;
use crate::transport::{BuiltRequest, DecodedResponse, RawResponse, ReqwestTransport, Transport};
use crate::transport::{read_body_all, read_body_preview};
use http::{Method, StatusCode};
use std::sync::Arc;
use url::Url;

const ERROR_BODY_PREVIEW: usize = 8 * 1024;
const DEBUG_BODY_MAX_CHARS: usize = 32 * 1024;

/// REST client bound to one scheme/host.
///
/// Cloning is cheap for any transport: clones share the transport and the template
/// cache, and every clone may be used concurrently.
pub struct RestClient<T: Transport = ReqwestTransport> {
    config: Arc<ClientConfig>,
    base: Url,
    resolver: Arc<UrlResolver>,
    transport: Arc<T>,
    debug_level: DebugLevel,
    sink: Arc<dyn DebugSink>,
}

impl<T: Transport> Clone for RestClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            base: self.base.clone(),
            resolver: Arc::clone(&self.resolver),
            transport: Arc::clone(&self.transport),
            debug_level: self.debug_level,
            sink: Arc::clone(&self.sink),
        }
    }
}

impl RestClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, ApiClientError> {
        Self::with_reqwest_client(config, reqwest::Client::new())
    }

    pub fn with_reqwest_client(config: ClientConfig, client: reqwest::Client) -> Result<Self, ApiClientError> {
        Self::with_transport(config, ReqwestTransport::new(client))
    }
}

impl<T: Transport> RestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ApiClientError> {
        let base = config.base_url()?;
        Ok(Self {
            resolver: Arc::new(UrlResolver::with_merge(config.query_merge)),
            debug_level: config.debug,
            config: Arc::new(config),
            base,
            transport: Arc::new(transport),
            sink: Arc::new(StderrDebugSink),
        })
    }

    /// Shares an existing resolver (and its cache) instead of the client's own.
    #[inline]
    pub fn with_resolver(mut self, resolver: Arc<UrlResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn resolver(&self) -> &Arc<UrlResolver> {
        &self.resolver
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    #[inline]
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.debug_level = level;
    }

    #[inline]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    #[inline]
    pub fn with_debug_sink(mut self, sink: impl DebugSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    #[inline]
    pub fn request(&self, method: Method, template: impl Into<String>) -> PendingRequest<'_, T> {
        PendingRequest::new(self, method, template.into())
    }

    #[inline]
    pub fn get(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::GET, template)
    }

    #[inline]
    pub fn post(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::POST, template)
    }

    #[inline]
    pub fn put(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::PUT, template)
    }

    #[inline]
    pub fn patch(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::PATCH, template)
    }

    #[inline]
    pub fn delete(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::DELETE, template)
    }

    #[inline]
    pub fn head(&self, template: impl Into<String>) -> PendingRequest<'_, T> {
        self.request(Method::HEAD, template)
    }

    /// `scheme://host` + rendered path + merged query, without sending anything.
    pub fn resolve_target(
        &self,
        template: &str,
        params: &PathParams,
        overrides: &QueryMap,
    ) -> Result<Url, ApiClientError> {
        let resolved = self.resolver.render(template, params, overrides)?;
        Ok(self.target_url(&resolved))
    }

    pub(crate) fn target_url(&self, resolved: &ResolvedPath) -> Url {
        let mut url = self.base.clone();
        url.set_path(&resolved.path);
        url.set_query(resolved.query_string().as_deref());
        url
    }

    pub(crate) async fn execute_built(
        &self,
        built: BuiltRequest,
        dbg: DebugLevel,
        request_format: Format,
        response_format: Format,
    ) -> Result<RawResponse, ApiClientError> {
        let url_str = built.url.as_str().to_owned();
        if dbg.is_verbose() {
            let meta = &built.meta;
            self.sink
                .request_start(dbg, &meta.method, &url_str, &meta.operation, meta.attempt);
        }
        if dbg.is_very_verbose() {
            self.sink.request_headers(dbg, &built.headers);
            if let Some(body) = &built.body {
                self.sink
                    .request_body(dbg, body, request_format, DEBUG_BODY_MAX_CHARS);
            }
        }

        let mut resp = self.transport.send(&built).await?;
        let status = resp.status;

        if !status.is_success() {
            let full_len = resp.content_length.and_then(|n| usize::try_from(n).ok());
            let preview = read_body_preview(resp.body.as_mut(), ERROR_BODY_PREVIEW).await?;
            if dbg.is_verbose() {
                self.sink.response_status(dbg, status, &url_str, false);
            }
            if dbg.is_very_verbose() {
                self.sink.response_headers(dbg, &resp.headers);
                self.sink
                    .response_body_preview(dbg, &resp.headers, &preview, full_len);
            }
            return Err(ApiClientError::HttpStatus {
                status,
                body: body_as_text(&resp.headers, &preview, full_len),
                headers: resp.headers,
            });
        }

        let body = read_body_all(resp.body.as_mut()).await?;
        if dbg.is_verbose() {
            self.sink.response_status(dbg, status, &url_str, true);
        }
        if dbg.is_very_verbose() {
            self.sink.response_headers(dbg, &resp.headers);
            self.sink
                .response_body(dbg, &body, response_format, DEBUG_BODY_MAX_CHARS);
        }

        Ok(RawResponse {
            meta: built.meta,
            url: built.url,
            status,
            headers: resp.headers,
            body,
        })
    }
}

/// Checks the no-content rules, then decodes with `D`.
pub(crate) fn decode_response<D, V>(resp: RawResponse) -> Result<DecodedResponse<V>, ApiClientError>
where
    D: Decodes<V>,
{
    let no_content = <D as ContentType>::IS_NO_CONTENT;
    if resp.meta.method == Method::HEAD && !no_content {
        return Err(ApiClientError::HeadRequiresNoContent {
            operation: resp.meta.operation,
        });
    }
    if matches!(resp.status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) && !no_content {
        return Err(ApiClientError::NoContentStatusRequiresNoContent {
            operation: resp.meta.operation,
            status: resp.status,
        });
    }

    let value = D::decode(&resp.body).map_err(|e| ApiClientError::Decode {
        source: e.into(),
        body: body_as_text(&resp.headers, &resp.body, None),
    })?;

    Ok(DecodedResponse {
        meta: resp.meta,
        url: resp.url,
        status: resp.status,
        headers: resp.headers,
        value,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::text::Text;
    use crate::codec::{Binary, NoContent};
    use crate::error::TemplateError;
    use crate::transport::{BoxFuture, RequestMeta, TransportError, TransportResponse};
    use bytes::Bytes;
    use http::HeaderMap;

    struct Unreachable;
    impl Transport for Unreachable {
        fn send<'a>(&'a self, _: &'a BuiltRequest) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
            Box::pin(async { Err(TransportError::msg("offline")) })
        }
    }

    fn client() -> RestClient<Unreachable> {
        RestClient::with_transport(ClientConfig::https("api.example.com"), Unreachable).unwrap()
    }

    fn raw(method: Method, status: StatusCode, body: &'static [u8]) -> RawResponse {
        RawResponse {
            meta: RequestMeta {
                operation: "Op".into(),
                template: "/x".into(),
                method,
                idempotent: true,
                attempt: 0,
            },
            url: Url::parse("https://api.example.com/x").unwrap(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn resolve_target_builds_absolute_url() {
        let c = client();
        let url = c
            .resolve_target(
                "/apis/v1/messages/{message}?Action=GetMessage",
                &PathParams::new().with("message", "a/b"),
                &QueryMap::new(),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/apis/v1/messages/a%2Fb?Action=GetMessage"
        );
        assert_eq!(c.cache_stats().entries, 1);
    }

    #[test]
    fn dot_segment_values_cannot_move_the_target() {
        let c = client();
        let params = PathParams::new().with("a", "..").with("b", ".");
        let err = c
            .resolve_target("/admin/{a}/{b}/x", &params, &QueryMap::new())
            .unwrap_err();
        let res = err.resolution().unwrap();
        assert_eq!(res.template, "/admin/{a}/{b}/x");
        assert_eq!(res.kind().invalid_parameter(), Some("a"));

        let err = c
            .resolve_target("/users/{id}/files", &PathParams::new().with("id", "."), &QueryMap::new())
            .unwrap_err();
        assert!(matches!(
            err.resolution().unwrap().kind(),
            TemplateError::InvalidParameter { .. }
        ));

        let url = c
            .resolve_target("/users/{id}/files", &PathParams::new().with("id", "%2e%2e"), &QueryMap::new())
            .unwrap();
        assert_eq!(url.path(), "/users/%252e%252e/files");
    }

    #[test]
    fn clones_share_the_cache() {
        let a = client();
        let b = a.clone();
        a.resolve_target("/s", &PathParams::new(), &QueryMap::new()).unwrap();
        b.resolve_target("/s", &PathParams::new(), &QueryMap::new()).unwrap();
        assert_eq!(b.cache_stats().hits, 1);
        assert!(Arc::ptr_eq(a.resolver(), b.resolver()));
        assert!(std::ptr::eq(a.transport(), b.transport()));
    }

    #[test]
    fn invalid_host_fails_construction() {
        let err = RestClient::with_transport(ClientConfig::https("a/b"), Unreachable)
            .err()
            .unwrap();
        assert!(matches!(err, ApiClientError::InvalidHost { .. }));
    }

    #[test]
    fn no_content_rules() {
        let err = decode_response::<Text, String>(raw(Method::HEAD, StatusCode::OK, b"")).unwrap_err();
        assert!(matches!(err, ApiClientError::HeadRequiresNoContent { .. }));

        let err = decode_response::<Text, String>(raw(Method::GET, StatusCode::NO_CONTENT, b""))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiClientError::NoContentStatusRequiresNoContent { status: StatusCode::NO_CONTENT, .. }
        ));

        decode_response::<NoContent, ()>(raw(Method::HEAD, StatusCode::OK, b"")).unwrap();
        let bin = decode_response::<Binary, Bytes>(raw(Method::GET, StatusCode::OK, b"\x00\x01")).unwrap();
        assert_eq!(bin.value.as_ref(), &[0, 1]);
    }

    #[test]
    fn decode_failure_keeps_body_preview() {
        let err = decode_response::<Text, String>(raw(Method::GET, StatusCode::OK, b"\xff\xfe")).unwrap_err();
        match err {
            ApiClientError::Decode { body, .. } => assert_eq!(body, "<non-utf8-text; 2 bytes>"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_tagged_with_operation() {
        let c = client();
        let err = c.get("/x/{id}").param("id", 1).operation("GetX").send().await.unwrap_err();
        match err {
            ApiClientError::InOperation { operation, source } => {
                assert_eq!(operation, "GetX");
                assert!(matches!(*source, ApiClientError::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
