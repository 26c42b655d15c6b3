//! Ordered multi-map used for query strings and headers.

/// An ordered multi-map from string keys to lists of string values.
///
/// Keys keep their first-insertion order. Lookups are case-sensitive; the
/// `*_ignore_case` helpers exist for header names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues {
    entries: Vec<(String, Vec<String>)>,
}

impl KeyValues {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`, keeping any values already present.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Replace every value under `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => *values = vec![value],
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values stored under `key`, empty if absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value whose key matches `key` ignoring ASCII case.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// Returns true if `key` is present (case-sensitive).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns true if `key` is present ignoring ASCII case.
    pub fn contains_key_ignore_case(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    /// Remove `key` and return its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Remove every key matching `key` ignoring ASCII case.
    pub fn remove_ignore_case(&mut self, key: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// Append every value of `other`, preserving its order.
    pub fn extend(&mut self, other: KeyValues) {
        for (key, values) in other.entries {
            for value in values {
                self.add(key.clone(), value);
            }
        }
    }

    /// Iterate keys with their value lists.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterate flattened `(key, value)` pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kv = KeyValues::new();
        for (k, v) in iter {
            kv.add(k, v);
        }
        kv
    }
}

impl From<&reqwest::header::HeaderMap> for KeyValues {
    fn from(headers: &reqwest::header::HeaderMap) -> Self {
        let mut kv = KeyValues::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                kv.add(name.as_str(), value);
            }
        }
        kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_order_and_groups_values() {
        let mut kv = KeyValues::new();
        kv.add("b", "1");
        kv.add("a", "2");
        kv.add("b", "3");

        let pairs: Vec<_> = kv.pairs().collect();
        assert_eq!(pairs, vec![("b", "1"), ("b", "3"), ("a", "2")]);
        assert_eq!(kv.len(), 2);
        assert_eq!(kv.get_all("b"), &["1".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_set_replaces_values() {
        let mut kv: KeyValues = [("x", "1"), ("x", "2")].into_iter().collect();
        kv.set("x", "3");
        assert_eq!(kv.get_all("x"), &["3".to_string()]);
    }

    #[test]
    fn test_case_sensitivity() {
        let mut kv = KeyValues::new();
        kv.add("Content-Type", "text/plain");

        assert!(kv.get("content-type").is_none());
        assert_eq!(kv.get_ignore_case("content-type"), Some("text/plain"));

        kv.remove_ignore_case("CONTENT-TYPE");
        assert!(kv.is_empty());
    }

    #[test]
    fn test_from_header_map() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("etag", "\"v1\"".parse().unwrap());
        headers.append("set-cookie", "a=1".parse().unwrap());
        headers.append("set-cookie", "b=2".parse().unwrap());

        let kv = KeyValues::from(&headers);
        assert_eq!(kv.get("etag"), Some("\"v1\""));
        assert_eq!(kv.get_all("set-cookie").len(), 2);
    }
}
