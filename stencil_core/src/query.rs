use crate::error::{QueryErrorReason, TemplateError};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use url::form_urlencoded;

/// How runtime query overrides combine with the query baked into a template.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMerge {
    /// Override values replace the template's values for the same key.
    #[default]
    Replace,
    /// Override values are appended after the template's values.
    Append,
}

/// Multi-valued query parameters.
///
/// Keys are kept sorted so encoding is deterministic; values of one key keep insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryMap(BTreeMap<String, Vec<String>>);

impl QueryMap {
    #[inline]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses `a=1&b=2&b=3&flag` (no leading `?`).
    ///
    /// `+` decodes to a space, `%XX` escapes are decoded, a pair without `=` yields an
    /// empty value, empty pairs are skipped. Malformed escapes are an error.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut map = Self::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(k, raw)?;
            let value = decode_component(v, raw)?;
            map.append(key, value);
        }
        Ok(map)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    #[inline]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Append (allow duplicates).
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Override-by-key. An empty `values` removes the key.
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, values);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.remove(key)
    }

    /// Number of distinct keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Flattened `(key, value)` pairs in encoding order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn merge(&mut self, overrides: &QueryMap, policy: QueryMerge) {
        for (key, values) in &overrides.0 {
            match (policy, self.0.entry(key.clone())) {
                (QueryMerge::Replace, Entry::Occupied(mut e)) => {
                    e.insert(values.clone());
                }
                (QueryMerge::Append, Entry::Occupied(mut e)) => {
                    e.get_mut().extend(values.iter().cloned());
                }
                (_, Entry::Vacant(e)) => {
                    e.insert(values.clone());
                }
            }
        }
    }

    pub fn merged(&self, overrides: &QueryMap, policy: QueryMerge) -> QueryMap {
        let mut out = self.clone();
        out.merge(overrides, policy);
        out
    }

    /// `application/x-www-form-urlencoded` serialization; empty string for an empty map.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = QueryMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

fn decode_component(component: &str, query: &str) -> Result<String, TemplateError> {
    let fail = |reason| TemplateError::MalformedQuery {
        query: query.to_owned(),
        reason,
    };
    if !escapes_well_formed(component) {
        return Err(fail(QueryErrorReason::InvalidEscape));
    }
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| fail(QueryErrorReason::InvalidUtf8))
}

fn escapes_well_formed(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = |j: usize| bytes.get(j).is_some_and(|b| b.is_ascii_hexdigit());
            if !(hex(i + 1) && hex(i + 2)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let q = QueryMap::parse("Action=GetMessage&Version=2020-01-01").unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q.get("Action").unwrap(), ["GetMessage"]);
        assert_eq!(q.get("Version").unwrap(), ["2020-01-01"]);
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(QueryMap::parse("").unwrap().is_empty());
        assert!(QueryMap::parse("&&").unwrap().is_empty());
    }

    #[test]
    fn repeated_keys_keep_order_and_bare_keys_are_empty() {
        let q = QueryMap::parse("tag=b&flag&tag=a&eq==x").unwrap();
        assert_eq!(q.get("tag").unwrap(), ["b", "a"]);
        assert_eq!(q.get("flag").unwrap(), [""]);
        assert_eq!(q.first("eq"), Some("=x"));
    }

    #[test]
    fn decodes_plus_and_escapes() {
        let q = QueryMap::parse("q=hello+world%21&k%20y=%2B").unwrap();
        assert_eq!(q.first("q"), Some("hello world!"));
        assert_eq!(q.first("k y"), Some("+"));
    }

    #[test]
    fn rejects_bad_escapes() {
        for raw in ["a=%", "a=%4", "a=%zz", "%g0=1"] {
            match QueryMap::parse(raw).unwrap_err() {
                TemplateError::MalformedQuery { reason, query } => {
                    assert_eq!(reason, QueryErrorReason::InvalidEscape);
                    assert_eq!(query, raw);
                }
                other => panic!("unexpected error for {raw}: {other:?}"),
            }
        }
        let err = QueryMap::parse("a=%FF").unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MalformedQuery { reason: QueryErrorReason::InvalidUtf8, .. }
        ));
    }

    #[test]
    fn merge_replace_and_append() {
        let base = QueryMap::parse("Action=Get&tag=a").unwrap();
        let overrides: QueryMap = [("tag", "b"), ("page", "2")].into_iter().collect();

        let replaced = base.merged(&overrides, QueryMerge::Replace);
        assert_eq!(replaced.get("tag").unwrap(), ["b"]);
        assert_eq!(replaced.get("page").unwrap(), ["2"]);
        assert_eq!(replaced.get("Action").unwrap(), ["Get"]);

        let appended = base.merged(&overrides, QueryMerge::Append);
        assert_eq!(appended.get("tag").unwrap(), ["a", "b"]);
        assert_eq!(appended.get("page").unwrap(), ["2"]);
    }

    #[test]
    fn set_and_remove() {
        let mut q = QueryMap::new();
        q.append("a", "1");
        q.set("a", ["2", "3"]);
        assert_eq!(q.get("a").unwrap(), ["2", "3"]);
        q.set("a", Vec::<String>::new());
        assert!(!q.contains_key("a"));
        q.append("b", "x");
        assert_eq!(q.remove("b"), Some(vec!["x".to_string()]));
        assert!(q.is_empty());
    }

    #[test]
    fn encodes_sorted_keys() {
        let q: QueryMap = [("z", "1"), ("a", "x y"), ("a", "&")].into_iter().collect();
        assert_eq!(q.encode(), "a=x+y&a=%26&z=1");
        assert_eq!(QueryMap::new().encode(), "");
    }
}
