use std::collections::{BTreeMap, BTreeSet};

use crate::Condition;

/// Attributes declared by `declared` caveats on a token.
///
/// A key declared twice with different values is dropped entirely, so an
/// attenuated token can never change what its issuer declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declared(BTreeMap<String, String>);

impl Declared {
    /// Collects the declarations found in `conditions`.
    pub fn infer<I, S>(conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        let mut conflicts = BTreeSet::new();

        for condition in conditions {
            let Ok(Condition::Declared { key, value }) = Condition::parse(condition.as_ref()) else {
                continue;
            };
            match values.get(&key) {
                Some(existing) if existing != &value => {
                    conflicts.insert(key);
                }
                Some(_) => {}
                None => {
                    values.insert(key, value);
                }
            }
        }

        for key in conflicts {
            values.remove(&key);
        }
        Self(values)
    }

    /// The value declared for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of declared keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Declared {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_infers_declarations() {
        let declared = Declared::infer([
            "time-before 2030-01-01T00:00:00Z",
            "declared username bob",
            "declared domain example.com",
            "declared username bob",
            "declared",
        ]);
        assert_eq!(declared.get("username"), Some("bob"));
        assert_eq!(declared.get("domain"), Some("example.com"));
        assert_eq!(declared.len(), 2);
    }

    #[test]
    fn it_drops_conflicting_keys() {
        let declared = Declared::infer([
            "declared username bob",
            "declared username alice",
            "declared username bob",
        ]);
        assert_eq!(declared.get("username"), None);
        assert!(declared.is_empty());
    }
}
