//! Path templates: `/apis/v1/messages/{message}` compiled into literal and
//! placeholder segments, rendered later against a set of [`PathParams`].

use crate::error::{MalformedReason, ParameterReason, TemplateError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Everything except RFC 3986 "unreserved" (ALPHA / DIGIT / "-" / "." / "_" / "~").
/// `/` is encoded too: a substituted value is always exactly one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

impl Segment {
    /// Literal text, or the bare placeholder name.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Literal(s) | Segment::Placeholder(s) => s,
        }
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Segment::Placeholder(_))
    }
}

/// Compiled form of a path template.
///
/// Contract:
/// - `segments` holds literals and placeholders in source order; two literals are never adjacent.
/// - `names` maps each placeholder name to its index in `segments`; names are unique.
/// - A template without placeholders is exactly one literal segment (possibly empty).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
    names: BTreeMap<String, usize>,
}

fn malformed(template: &str, offset: usize, reason: MalformedReason) -> TemplateError {
    TemplateError::MalformedTemplate {
        template: template.to_owned(),
        offset,
        reason,
    }
}

impl PathTemplate {
    pub fn compile(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut names = BTreeMap::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices();

        while let Some((open, c)) = chars.next() {
            match c {
                '{' => {
                    let mut close = None;
                    for (i, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                close = Some(i);
                                break;
                            }
                            '{' => return Err(malformed(raw, i, MalformedReason::NestedBrace)),
                            _ => {}
                        }
                    }
                    let close = close
                        .ok_or_else(|| malformed(raw, open, MalformedReason::UnterminatedPlaceholder))?;
                    let name = &raw[open + 1..close];
                    if name.is_empty() {
                        return Err(malformed(raw, open, MalformedReason::EmptyPlaceholder));
                    }
                    if names.contains_key(name) {
                        return Err(malformed(
                            raw,
                            open,
                            MalformedReason::DuplicateName(name.to_owned()),
                        ));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    names.insert(name.to_owned(), segments.len());
                    segments.push(Segment::Placeholder(name.to_owned()));
                }
                '}' => return Err(malformed(raw, open, MalformedReason::UnmatchedClosingBrace)),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() || segments.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments, names })
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments as plain strings (placeholders by bare name).
    pub fn segment_strs(&self) -> Vec<&str> {
        self.segments.iter().map(Segment::as_str).collect()
    }

    #[inline]
    pub fn names(&self) -> &BTreeMap<String, usize> {
        &self.names
    }

    #[inline]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Placeholder names in source order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| s.is_placeholder())
            .map(Segment::as_str)
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.names.is_empty()
    }

    /// Substitutes every placeholder; values are percent-encoded as a single path segment.
    ///
    /// `.` and `..` are refused: they survive encoding and URL normalization would
    /// resolve them against the surrounding path.
    pub fn render(&self, params: &PathParams) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.literal_len() + 16 * self.names.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingParameter { name: name.clone() })?;
                    if matches!(value, "." | "..") {
                        return Err(TemplateError::InvalidParameter {
                            name: name.clone(),
                            reason: ParameterReason::DotSegment,
                        });
                    }
                    out.extend(utf8_percent_encode(value, PATH_SEGMENT));
                }
            }
        }
        Ok(out)
    }

    fn literal_len(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.len()),
                Segment::Placeholder(_) => None,
            })
            .sum()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// Runtime values bound to placeholder names.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    #[inline]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) -> Option<String> {
        self.0.insert(name.into(), value.to_string())
    }

    #[inline]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = PathParams::new();
        params.extend(iter);
        params
    }
}

impl<K: Into<String>, V: ToString> Extend<(K, V)> for PathParams {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reason(raw: &str) -> MalformedReason {
        match PathTemplate::compile(raw).unwrap_err() {
            TemplateError::MalformedTemplate { reason, .. } => reason,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn compiles_trailing_placeholder() {
        let t = PathTemplate::compile("/apis/v1/messages/{message}").unwrap();
        assert_eq!(t.segment_strs(), vec!["/apis/v1/messages/", "message"]);
        assert_eq!(t.names().len(), 1);
        assert_eq!(t.position("message"), Some(1));
        assert!(t.segments()[1].is_placeholder());
    }

    #[test]
    fn static_path_is_one_literal() {
        let t = PathTemplate::compile("/healthz").unwrap();
        assert_eq!(t.segments(), &[Segment::Literal("/healthz".into())]);
        assert!(t.is_static());
        assert_eq!(t.render(&PathParams::new()).unwrap(), "/healthz");

        let empty = PathTemplate::compile("").unwrap();
        assert_eq!(empty.segments(), &[Segment::Literal(String::new())]);
        assert_eq!(empty.render(&PathParams::new()).unwrap(), "");
    }

    #[test]
    fn adjacent_and_leading_placeholders() {
        let t = PathTemplate::compile("{bucket}{key}/meta").unwrap();
        assert_eq!(t.segment_strs(), vec!["bucket", "key", "/meta"]);
        assert_eq!(t.position("bucket"), Some(0));
        assert_eq!(t.position("key"), Some(1));
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["bucket", "key"]);
    }

    #[test]
    fn rejects_malformed_templates() {
        assert_eq!(reason("/m/{message"), MalformedReason::UnterminatedPlaceholder);
        assert_eq!(reason("/m/{}"), MalformedReason::EmptyPlaceholder);
        assert_eq!(reason("/m/{a{b}}"), MalformedReason::NestedBrace);
        assert_eq!(reason("/m/a}"), MalformedReason::UnmatchedClosingBrace);
        assert_eq!(
            reason("/{id}/x/{id}"),
            MalformedReason::DuplicateName("id".into())
        );
    }

    #[test]
    fn error_offset_points_at_opening_brace() {
        match PathTemplate::compile("/ab/{message").unwrap_err() {
            TemplateError::MalformedTemplate { offset, template, .. } => {
                assert_eq!(offset, 4);
                assert_eq!(template, "/ab/{message");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn render_substitutes_and_encodes() {
        let t = PathTemplate::compile("/users/{user}/files/{file}").unwrap();
        let params = PathParams::new().with("user", 42).with("file", "a b/c.txt");
        assert_eq!(t.render(&params).unwrap(), "/users/42/files/a%20b%2Fc.txt");

        let unreserved = PathParams::new().with("user", "A-z_0.9~").with("file", "ü");
        assert_eq!(t.render(&unreserved).unwrap(), "/users/A-z_0.9~/files/%C3%BC");
    }

    #[test]
    fn render_reports_missing_parameter() {
        let t = PathTemplate::compile("/users/{user}/files/{file}").unwrap();
        let err = t.render(&PathParams::new().with("user", "u")).unwrap_err();
        assert_eq!(err.missing_parameter(), Some("file"));
    }

    #[test]
    fn render_refuses_dot_segments() {
        let t = PathTemplate::compile("/users/{id}/files").unwrap();
        for v in [".", ".."] {
            match t.render(&PathParams::new().with("id", v)).unwrap_err() {
                TemplateError::InvalidParameter { name, reason } => {
                    assert_eq!(name, "id");
                    assert_eq!(reason, ParameterReason::DotSegment);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        // escaped dots are literal text, dots inside a longer value are harmless
        let cases = [
            ("%2e%2e", "/users/%252e%252e/files"),
            ("%2E", "/users/%252E/files"),
            ("...", "/users/.../files"),
            ("a..b", "/users/a..b/files"),
            (".hidden", "/users/.hidden/files"),
        ];
        for (v, expected) in cases {
            assert_eq!(t.render(&PathParams::new().with("id", v)).unwrap(), expected);
        }
    }

    #[test]
    fn display_reconstructs_source() {
        let raw = "/a/{b}/c{d}";
        let t = PathTemplate::compile(raw).unwrap();
        assert_eq!(t.to_string(), raw);
        assert_eq!(PathTemplate::compile(&t.to_string()).unwrap(), t);
    }

    #[test]
    fn unused_params_are_ignored() {
        let t = PathTemplate::compile("/x/{id}").unwrap();
        let params: PathParams = [("id", "1"), ("extra", "2")].into_iter().collect();
        assert_eq!(t.render(&params).unwrap(), "/x/1");
    }
}
