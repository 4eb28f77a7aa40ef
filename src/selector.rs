//! Equality-based label selectors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
}

/// A conjunction of `key=value` / `key!=value` requirements.
///
/// ```
/// use std::collections::BTreeMap;
/// use hosts_sync::LabelSelector;
///
/// let selector: LabelSelector = "name=rbd-hub, tier!=canary".parse().unwrap();
/// let labels = BTreeMap::from([("name".to_string(), "rbd-hub".to_string())]);
/// assert!(selector.matches(&labels));
/// assert_eq!(selector.to_string(), "name=rbd-hub,tier!=canary");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parses `k=v`, `k==v` and `k!=v` terms separated by commas.
    /// An empty string selects everything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSelector`] for a term without an operator
    /// or with an empty key.
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let mut requirements = Vec::new();
        for term in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                Requirement::NotEquals(key(k, term)?, v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                Requirement::Equals(key(k, term)?, v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                Requirement::Equals(key(k, term)?, v.trim().to_string())
            } else {
                return Err(SyncError::InvalidSelector(format!(
                    "{term:?} has no operator"
                )));
            };
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }

    /// `true` if the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluates every requirement against `labels`.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| match r {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
        })
    }
}

fn key(raw: &str, term: &str) -> Result<String, SyncError> {
    let key = raw.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(SyncError::InvalidSelector(format!(
            "{term:?} has an invalid key"
        )));
    }
    Ok(key.to_string())
}

impl FromStr for LabelSelector {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match r {
                Requirement::Equals(k, v) => write!(f, "{k}={v}")?,
                Requirement::NotEquals(k, v) => write!(f, "{k}!={v}")?,
            }
        }
        Ok(())
    }
}
