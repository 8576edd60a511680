use crate::codec::{ContentType, Decodes, Encodes, Format, FormatType};
use bytes::Bytes;
use std::str::Utf8Error;

pub struct Text;

impl ContentType for Text {
    const CONTENT_TYPE: &'static str = "text/plain; charset=utf-8";
}

impl FormatType for Text {
    const FORMAT_TYPE: Format = Format::Text;
}

impl Encodes<str> for Text {
    type Error = std::convert::Infallible;
    fn encode(value: &str) -> Result<Bytes, Self::Error> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl Decodes<String> for Text {
    type Error = Utf8Error;
    fn decode(bytes: &Bytes) -> Result<String, Self::Error> {
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }
}
