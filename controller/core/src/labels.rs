use serde::Serialize;
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

#[derive(Clone, Debug, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// Selects the claims that may be read or deleted.
///
/// Every required label must be present with exactly the required value. An empty selector
/// selects everything.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Map,
}

/// Describes the first requirement of a [`Selector`] that a label set fails.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    #[error("labels do not contain key {key}")]
    MissingKey { key: String },

    #[error("label {key} has value {actual:?}, expected {expected:?}")]
    Value {
        key: String,
        expected: String,
        actual: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("malformed selector term {0:?}: expected key=value")]
    MissingValue(String),

    #[error("malformed selector term {0:?}: empty key")]
    EmptyKey(String),
}

// === Selector ===

impl Selector {
    pub fn from_map(match_labels: Map) -> Self {
        Self { match_labels }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.check(labels).is_ok()
    }

    /// Like [`Selector::matches`], but reports which requirement failed.
    pub fn check(&self, labels: &Labels) -> Result<(), Mismatch> {
        for (k, v) in self.match_labels.iter() {
            match labels.0.get(k) {
                Some(actual) if actual == v => {}
                Some(actual) => {
                    return Err(Mismatch::Value {
                        key: k.clone(),
                        expected: v.clone(),
                        actual: actual.clone(),
                    })
                }
                None => return Err(Mismatch::MissingKey { key: k.clone() }),
            }
        }

        Ok(())
    }
}

/// Parses a comma-separated list of `key=value` requirements.
impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut match_labels = Map::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (k, v) = term
                .split_once('=')
                .ok_or_else(|| SelectorError::MissingValue(term.to_string()))?;
            let k = k.trim();
            if k.is_empty() {
                return Err(SelectorError::EmptyKey(term.to_string()));
            }
            match_labels.insert(k.to_string(), v.trim().to_string());
        }
        Ok(Self { match_labels })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (k, v) in &self.match_labels {
            write!(f, "{sep}{k}={v}")?;
            sep = ",";
        }
        Ok(())
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// === Labels ===

impl Labels {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<Map>> for Labels {
    #[inline]
    fn from(labels: Option<Map>) -> Self {
        labels.unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty match"),
            (
                Selector::default(),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "empty selector matches labels",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "bar"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("bah", "baz"))),
                false,
                "missing key",
            ),
            (
                Selector::from_iter(Some(("foo", "bar"))),
                Labels::from_iter(Some(("foo", "baz"))),
                false,
                "value mismatch",
            ),
            (
                Selector::from_iter(vec![("foo", "bar"), ("bah", "baz")]),
                Labels::from_iter(Some(("foo", "bar"))),
                false,
                "all requirements must hold",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn check_reports_failed_requirement() {
        let selector = Selector::from_iter(Some(("team", "a")));

        assert_eq!(
            selector.check(&Labels::default()),
            Err(Mismatch::MissingKey { key: "team".into() })
        );
        assert_eq!(
            selector.check(&Labels::from_iter(Some(("team", "b")))),
            Err(Mismatch::Value {
                key: "team".into(),
                expected: "a".into(),
                actual: "b".into(),
            })
        );
        assert_eq!(selector.check(&Labels::from_iter(Some(("team", "a")))), Ok(()));
    }

    #[test]
    fn parse() {
        assert_eq!("".parse::<Selector>().unwrap(), Selector::default());
        assert_eq!(
            "team=a".parse::<Selector>().unwrap(),
            Selector::from_iter(Some(("team", "a")))
        );
        assert_eq!(
            "team=a, tier = gold".parse::<Selector>().unwrap(),
            Selector::from_iter(vec![("team", "a"), ("tier", "gold")])
        );
        assert_eq!(
            "empty=".parse::<Selector>().unwrap(),
            Selector::from_iter(Some(("empty", "")))
        );
    }

    #[test]
    fn parse_malformed() {
        assert_eq!(
            "team=a,tier".parse::<Selector>(),
            Err(SelectorError::MissingValue("tier".into()))
        );
        assert_eq!(
            "=a".parse::<Selector>(),
            Err(SelectorError::EmptyKey("=a".into()))
        );
    }

    #[test]
    fn display_round_trips() {
        let selector = "tier=gold,team=a".parse::<Selector>().unwrap();
        assert_eq!(selector.to_string(), "team=a,tier=gold");
        assert_eq!(selector.to_string().parse::<Selector>().unwrap(), selector);
    }
}
