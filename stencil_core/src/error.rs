use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use http::{HeaderMap, StatusCode};
use std::error::Error;
use std::fmt;
use thiserror::Error;

pub type FxError = Box<dyn Error + Send + Sync>;

/// Why a path template was rejected by the compiler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MalformedReason {
    /// `{` without a matching `}`.
    UnterminatedPlaceholder,
    /// `{}`.
    EmptyPlaceholder,
    /// `{` opened while a placeholder is still open.
    NestedBrace,
    /// `}` outside of any placeholder.
    UnmatchedClosingBrace,
    /// Same placeholder name used twice in one template.
    DuplicateName(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::UnterminatedPlaceholder => f.write_str("unterminated placeholder"),
            MalformedReason::EmptyPlaceholder => f.write_str("empty placeholder name"),
            MalformedReason::NestedBrace => f.write_str("'{' inside a placeholder"),
            MalformedReason::UnmatchedClosingBrace => f.write_str("'}' without matching '{'"),
            MalformedReason::DuplicateName(name) => write!(f, "duplicate placeholder '{name}'"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueryErrorReason {
    /// `%` not followed by two hex digits.
    InvalidEscape,
    /// Escapes decode to bytes that are not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for QueryErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorReason::InvalidEscape => f.write_str("invalid percent escape"),
            QueryErrorReason::InvalidUtf8 => f.write_str("escapes do not decode to UTF-8"),
        }
    }
}

/// Why a bound path value was refused at render time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParameterReason {
    /// `.` or `..`: URL normalization would turn it into a path move.
    DotSegment,
}

impl fmt::Display for ParameterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterReason::DotSegment => f.write_str("value is a dot segment"),
        }
    }
}

/// Parse and render failures of the template engine.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("malformed template {template:?}: {reason} (byte {offset})")]
    MalformedTemplate {
        template: String,
        offset: usize,
        reason: MalformedReason,
    },

    #[error("malformed query {query:?}: {reason}")]
    MalformedQuery {
        query: String,
        reason: QueryErrorReason,
    },

    #[error("missing parameter: {name}")]
    MissingParameter { name: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: String,
        reason: ParameterReason,
    },
}

impl TemplateError {
    #[inline]
    pub fn is_malformed_template(&self) -> bool {
        matches!(self, TemplateError::MalformedTemplate { .. })
    }

    #[inline]
    pub fn is_malformed_query(&self) -> bool {
        matches!(self, TemplateError::MalformedQuery { .. })
    }

    /// Name of the unbound placeholder, for `MissingParameter`.
    pub fn missing_parameter(&self) -> Option<&str> {
        match self {
            TemplateError::MissingParameter { name } => Some(name),
            _ => None,
        }
    }

    /// Name of the refused placeholder, for `InvalidParameter`.
    pub fn invalid_parameter(&self) -> Option<&str> {
        match self {
            TemplateError::InvalidParameter { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A [`TemplateError`] tagged with the raw template it came from.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[error("cannot resolve {template:?}: {source}")]
pub struct ResolutionError {
    pub template: String,
    #[source]
    pub source: TemplateError,
}

impl ResolutionError {
    #[inline]
    pub fn new(template: impl Into<String>, source: TemplateError) -> Self {
        Self {
            template: template.into(),
            source,
        }
    }

    #[inline]
    pub fn kind(&self) -> &TemplateError {
        &self.source
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiClientError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("invalid host {host:?}: {reason:?}")]
    InvalidHost {
        host: String,
        reason: HostInvalidReason,
    },

    #[error("build url error: {0}")]
    BuildUrl(#[from] url::ParseError),

    #[error("transport: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("status {status}")]
    HttpStatus {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },

    #[error("decode error: {source}")]
    Decode { source: FxError, body: String },

    #[error("HEAD response requires the NoContent decoder (operation={operation})")]
    HeadRequiresNoContent { operation: String },

    #[error("status {status} has no content; operation must use the NoContent decoder (operation={operation})")]
    NoContentStatusRequiresNoContent {
        operation: String,
        status: StatusCode,
    },

    #[error("codec: {0}")]
    Codec(#[from] FxError),

    #[error("in operation {operation}: {source}")]
    InOperation {
        operation: String,
        source: Box<ApiClientError>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostInvalidReason {
    Empty,
    ContainsScheme,
    ContainsWhitespace,
    ContainsSlash,
    ContainsDelimiter(char),
}

impl ApiClientError {
    pub fn codec_error(error: impl Into<FxError>) -> ApiClientError {
        ApiClientError::Codec(error.into())
    }

    #[inline]
    pub fn in_operation(operation: &str, e: ApiClientError) -> ApiClientError {
        match e {
            ApiClientError::InOperation { .. } => e,
            _ => ApiClientError::InOperation {
                operation: operation.to_owned(),
                source: Box::new(e),
            },
        }
    }

    /// Strips the `InOperation` wrapper, if any.
    pub fn root(&self) -> &ApiClientError {
        match self {
            ApiClientError::InOperation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn resolution(&self) -> Option<&ResolutionError> {
        match self.root() {
            ApiClientError::Resolution(e) => Some(e),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self.root() {
            ApiClientError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Text preview of a response body for error reports, capped at 8 KiB.
pub fn body_as_text(headers: &HeaderMap, body: &bytes::Bytes, full_len: Option<usize>) -> String {
    const MAX: usize = 8 * 1024;
    let ct = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let slice = &body[..body.len().min(MAX)];
    let total_len = full_len.unwrap_or(body.len());
    let textual = ct.starts_with("application/json") || ct.starts_with("text/") || ct.is_empty();
    if textual {
        match std::str::from_utf8(slice) {
            Ok(s) if total_len > slice.len() => format!("{s}..."),
            Ok(s) => s.to_owned(),
            Err(_) => format!("<non-utf8-text; {} bytes>", total_len),
        }
    } else {
        let b64 = B64.encode(slice);
        format!(
            "<non-text; {} bytes; base64:{}{}>",
            total_len,
            &b64[..b64.len().min(1024)],
            if b64.len() > 1024 { "..." } else { "" }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use http::HeaderValue;
    use http::header::CONTENT_TYPE;

    #[test]
    fn in_operation_does_not_nest() {
        let inner = ApiClientError::HttpStatus {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            body: String::new(),
        };
        let once = ApiClientError::in_operation("GetMessage", inner);
        let twice = ApiClientError::in_operation("Other", once);
        match &twice {
            ApiClientError::InOperation { operation, source } => {
                assert_eq!(operation, "GetMessage");
                assert!(matches!(**source, ApiClientError::HttpStatus { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(twice.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn resolution_error_display_carries_template() {
        let e = ResolutionError::new(
            "/m/{id}",
            TemplateError::MissingParameter { name: "id".into() },
        );
        assert_eq!(e.to_string(), "cannot resolve \"/m/{id}\": missing parameter: id");
        assert_eq!(e.kind().missing_parameter(), Some("id"));
    }

    #[test]
    fn body_preview_base64_for_binary() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        let s = body_as_text(&headers, &Bytes::from_static(&[0, 1, 2]), None);
        assert_eq!(s, "<non-text; 3 bytes; base64:AAEC>");

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let s = body_as_text(&headers, &Bytes::from_static(b"oops"), Some(10));
        assert_eq!(s, "oops...");
    }
}
