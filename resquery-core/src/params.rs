//! Request parameters as received from a client.
//!
//! A [`QueryRequest`] is captured once and never changed. Pipeline stages work on a
//! [`RemainingParams`] value instead: each stage takes the keys it understands and
//! hands back a new value holding everything it did not consume.

/// Ordered multimap of request parameter names to their raw string values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pairs: Vec<(String, String)>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the first value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Starts a consumption pass over a copy of the parameters.
    pub fn remaining(&self) -> RemainingParams {
        RemainingParams { pairs: self.pairs.clone() }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryRequest {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// The parameters not consumed by any pipeline stage so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemainingParams {
    pairs: Vec<(String, String)>,
}

impl RemainingParams {
    /// Removes every value of `key`.
    pub fn take(self, key: &str) -> (Vec<String>, RemainingParams) {
        let (taken, rest) = self.take_matching(|k| k == key);
        (taken.into_iter().map(|(_, v)| v).collect(), rest)
    }

    /// Removes every pair whose key satisfies `predicate`, keeping the order of both halves.
    pub fn take_matching<P>(self, predicate: P) -> (Vec<(String, String)>, RemainingParams)
    where
        P: Fn(&str) -> bool,
    {
        let (taken, rest) = self
            .pairs
            .into_iter()
            .partition(|(k, _)| predicate(k));
        (taken, RemainingParams { pairs: rest })
    }

    /// Removes `root` and every bracketed `root[...]` key.
    pub fn take_family(self, root: &str) -> (Vec<(String, String)>, RemainingParams) {
        self.take_matching(|k| bracket_segments(k, root).is_some())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Splits a bracketed parameter key into its segments.
///
/// `filter[age][gte]` with root `filter` yields `["age", "gte"]` and a bare `filter`
/// yields no segments. Keys of another family, or with unbalanced brackets, yield `None`.
pub fn bracket_segments<'a>(key: &'a str, root: &str) -> Option<Vec<&'a str>> {
    let mut rest = key.strip_prefix(root)?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        segments.push(&inner[..end]);
        rest = &inner[end + 1..];
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_leaves_the_request_untouched() {
        let request = QueryRequest::from_pairs([("limit", "5"), ("sort", "a"), ("limit", "7")]);

        let (limits, rest) = request.remaining().take("limit");
        assert_eq!(limits, vec!["5".to_string(), "7".to_string()]);
        assert!(!rest.contains("limit"));
        assert!(rest.contains("sort"));

        assert_eq!(request.get_all("limit").count(), 2);
        assert_eq!(request.get("sort"), Some("a"));
    }

    #[test]
    fn lookups_outlive_the_key() {
        let request = QueryRequest::from_pairs([("sort", "a:asc"), ("limit", "3"), ("sort", "b")]);

        let first = {
            let key = String::from("sort");
            request.get(&key)
        };
        assert_eq!(first, Some("a:asc"));

        let all = {
            let key = String::from("sort");
            request.get_all(&key).collect::<Vec<_>>()
        };
        assert_eq!(all, vec!["a:asc", "b"]);
        assert_eq!(request.get("skip"), None);
    }

    #[test]
    fn take_family_matches_brackets_only() {
        let request: QueryRequest = [
            ("populate", "author"),
            ("populate[comments]", "author"),
            ("populatedeep", "comments.author"),
            ("filter[age][gte]", ">3"),
        ]
        .into_iter()
        .collect();

        let (taken, rest) = request.remaining().take_family("populate");
        assert_eq!(taken.len(), 2);
        assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["populatedeep", "filter[age][gte]"]);
    }

    #[test]
    fn bracket_segments_parsing() {
        assert_eq!(bracket_segments("filter[age][gte]", "filter"), Some(vec!["age", "gte"]));
        assert_eq!(bracket_segments("filter[+status]", "filter"), Some(vec!["+status"]));
        assert_eq!(bracket_segments("filter", "filter"), Some(vec![]));
        assert_eq!(bracket_segments("filters[a]", "filter"), None);
        assert_eq!(bracket_segments("filter[a", "filter"), None);
        assert_eq!(bracket_segments("sort", "filter"), None);
    }
}
