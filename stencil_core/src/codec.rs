use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use bytes::Bytes;

#[cfg(feature = "json")]
pub(crate) mod json;

pub(crate) mod text;

/// How a payload is previewed in diagnostics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Binary,
    Text,
}

pub trait FormatType {
    const FORMAT_TYPE: Format;
}

pub trait ContentType {
    /// Empty means no relevant Content-Type/Accept.
    const CONTENT_TYPE: &'static str;
    const IS_NO_CONTENT: bool = false;
}

pub trait Decodes<T>: ContentType + FormatType {
    type Error: std::error::Error + Send + Sync + 'static;
    fn decode(bytes: &Bytes) -> Result<T, Self::Error>;
}

pub trait Encodes<T: ?Sized>: ContentType + FormatType {
    type Error: std::error::Error + Send + Sync + 'static;
    fn encode(value: &T) -> Result<Bytes, Self::Error>;
}

/// Empty bodies: requests without payload, `HEAD`, `204`/`205` responses.
pub struct NoContent;

impl ContentType for NoContent {
    const CONTENT_TYPE: &'static str = "";
    const IS_NO_CONTENT: bool = true;
}

impl FormatType for NoContent {
    const FORMAT_TYPE: Format = Format::Text;
}

impl Encodes<()> for NoContent {
    type Error = std::convert::Infallible;
    fn encode(_: &()) -> Result<Bytes, Self::Error> {
        Ok(Bytes::new())
    }
}

impl Decodes<()> for NoContent {
    type Error = std::convert::Infallible;
    fn decode(_: &Bytes) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Raw bytes, previewed as base64.
pub struct Binary;

impl ContentType for Binary {
    const CONTENT_TYPE: &'static str = "application/octet-stream";
}

impl FormatType for Binary {
    const FORMAT_TYPE: Format = Format::Binary;
}

impl Encodes<[u8]> for Binary {
    type Error = std::convert::Infallible;
    fn encode(value: &[u8]) -> Result<Bytes, Self::Error> {
        Ok(Bytes::copy_from_slice(value))
    }
}

impl Decodes<Bytes> for Binary {
    type Error = std::convert::Infallible;
    fn decode(bytes: &Bytes) -> Result<Bytes, Self::Error> {
        Ok(bytes.clone())
    }
}

pub(crate) fn format_bytes_for_debug(format: Format, bytes: &[u8], max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let (slice_len, rendered) = match format {
        Format::Text => {
            // lossy UTF-8 preview: at most 4 bytes per char
            let slice_len = bytes.len().min(max_chars.saturating_mul(4).max(1));
            (slice_len, String::from_utf8_lossy(&bytes[..slice_len]).into_owned())
        }
        Format::Binary => {
            // base64: 3 bytes -> 4 chars
            let slice_len = bytes.len().min(max_chars.saturating_mul(3).div_ceil(4).max(1));
            (slice_len, STANDARD_NO_PAD.encode(&bytes[..slice_len]))
        }
    };
    let mut s = truncate_for_debug(&rendered, max_chars);
    if slice_len < bytes.len() && !s.ends_with('…') {
        s.push('…');
    }
    s
}

pub(crate) fn truncate_for_debug(s: &str, max_chars: usize) -> String {
    let mut it = s.chars();
    let mut out: String = it.by_ref().take(max_chars).collect();
    if it.next().is_some() {
        out.push('…');
    }
    out
}
