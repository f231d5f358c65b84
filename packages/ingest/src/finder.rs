//! Depth-first key search over arbitrary JSON trees.
//!
//! Vendors nest exception objects anywhere: inside the header, under a
//! `body` wrapper, with namespace prefixes (`s:Exception`) or in lower case.
//! [`KeyFinder`] yields every value stored under one of the target keys, in
//! document order, at any depth.

use serde_json::map;
use serde_json::Value;

/// Normalize a key for comparison: strip a namespace prefix and lowercase it.
///
/// # Examples
/// ```
/// use counter_ingest::finder::normalize_key;
///
/// assert_eq!(normalize_key("ns:Exception"), "exception");
/// assert_eq!(normalize_key("Code"), "code");
/// ```
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.split_once(':')
        .map_or(key, |(_, local)| local)
        .to_lowercase()
}

enum Frame<'a> {
    Mapping(map::Iter<'a>),
    Sequence(std::slice::Iter<'a, Value>),
}

impl<'a> Frame<'a> {
    fn for_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(Self::Mapping(object.iter())),
            Value::Array(array) => Some(Self::Sequence(array.iter())),
            _ => None,
        }
    }
}

/// Lazy depth-first search for values under matching keys.
///
/// A matching value is yielded before its own children are searched.
pub struct KeyFinder<'a> {
    names: Vec<String>,
    stack: Vec<Frame<'a>>,
}

impl<'a> KeyFinder<'a> {
    /// Search `root` for any of `names` (case-insensitive, namespace-agnostic).
    #[must_use]
    pub fn new(root: &'a Value, names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_lowercase()).collect(),
            stack: Frame::for_value(root).into_iter().collect(),
        }
    }

    fn matches(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.names.iter().any(|name| *name == key)
    }
}

impl<'a> Iterator for KeyFinder<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame {
                Frame::Mapping(entries) => match entries.next() {
                    Some((key, value)) => {
                        if let Some(child) = Frame::for_value(value) {
                            self.stack.push(child);
                        }
                        if self.matches(key) {
                            return Some(value);
                        }
                    }
                    None => {
                        self.stack.pop();
                    }
                },
                Frame::Sequence(values) => match values.next() {
                    Some(value) => {
                        if let Some(child) = Frame::for_value(value) {
                            self.stack.push(child);
                        }
                    }
                    None => {
                        self.stack.pop();
                    }
                },
            }
        }
    }
}

/// First value found under one of `names`.
#[must_use]
pub fn find_first<'a>(root: &'a Value, names: &[&str]) -> Option<&'a Value> {
    KeyFinder::new(root, names).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_finds_nested_in_document_order() {
        let doc = json!({
            "a": {"Code": 1},
            "b": [{"x": {"code": 2}}, {"ns:CODE": 3}],
            "Code": 4
        });
        let found: Vec<_> = KeyFinder::new(&doc, &["Code"]).collect();
        assert_eq!(found, vec![&json!(1), &json!(2), &json!(3), &json!(4)]);
    }

    #[test]
    fn test_match_is_yielded_before_its_children() {
        let doc = json!({"Exception": {"Exception": {"Code": 1}}});
        let found: Vec<_> = KeyFinder::new(&doc, &["exception"]).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1], &json!({"Code": 1}));
    }

    #[test]
    fn test_scalar_root_yields_nothing() {
        let doc = json!("Exception");
        assert_eq!(KeyFinder::new(&doc, &["Exception"]).count(), 0);
    }

    #[test]
    fn test_multiple_names() {
        let doc = json!({"Exceptions": [], "Exception": {}});
        assert_eq!(KeyFinder::new(&doc, &["Exception", "Exceptions"]).count(), 2);
    }

    #[test]
    fn test_find_first() {
        let doc = json!([{"Message": "first"}, {"Message": "second"}]);
        assert_eq!(find_first(&doc, &["message"]), Some(&json!("first")));
        assert_eq!(find_first(&doc, &["data"]), None);
    }
}
