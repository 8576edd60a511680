mod cache;
mod client;
mod codec;
mod config;
mod debug;
pub mod error;
mod query;
mod request;
mod resolver;
mod template;
mod timeout;
pub mod transport;

pub mod prelude {
    pub use crate::cache::{CacheStats, ParsedUrl, TemplateCache};
    pub use crate::client::RestClient;
    #[cfg(feature = "json")]
    pub use crate::codec::json::Json;
    pub use crate::codec::{Binary, ContentType, Decodes, Encodes, Format, FormatType, NoContent, text::Text};
    pub use crate::config::{ClientConfig, SchemeKind};
    pub use crate::debug::{DebugLevel, DebugSink, NoopDebugSink, StderrDebugSink, TracingDebugSink};
    pub use crate::error::{
        ApiClientError, FxError, HostInvalidReason, MalformedReason, ParameterReason, QueryErrorReason, ResolutionError,
        TemplateError,
    };
    pub use crate::query::{QueryMap, QueryMerge};
    pub use crate::request::PendingRequest;
    pub use crate::resolver::{ResolvedPath, UrlResolver};
    pub use crate::template::{PathParams, PathTemplate, Segment};
    pub use crate::timeout::TimeoutOverride;
    pub use crate::transport::{BuiltRequest, DecodedResponse, RawResponse, RequestMeta};
    pub use crate::transport::{ReqwestTransport, Transport};
}
