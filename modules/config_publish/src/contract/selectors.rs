//! Selector sets addressing a configuration to a class of consumers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered selector map (e.g. `app`, `env`, `dc`).
///
/// The canonical string is `k1=v1,k2=v2` sorted by key; it doubles as a
/// store lookup key, so the rendering must never change between builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selectors(BTreeMap<String, String>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("selector entry '{0}' is not of the form key=value")]
    MalformedEntry(String),
    #[error("selector '{0}' contains a reserved character (',' or '=') or is empty")]
    ReservedCharacter(String),
    #[error("duplicate selector key '{0}'")]
    DuplicateKey(String),
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a selector dimension, rejecting characters the canonical
    /// string cannot carry
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SelectorError> {
        let key = key.into();
        let value = value.into();
        check_token(&key)?;
        check_token(&value)?;
        self.0.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical serialization used as the artifact lookup key
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Inverse of [`Selectors::canonical`]; the empty string is the empty set
    pub fn parse(s: &str) -> Result<Self, SelectorError> {
        let mut selectors = Self::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| SelectorError::MalformedEntry(entry.to_string()))?;
            let (key, value) = (key.trim(), value.trim());
            if selectors.0.contains_key(key) {
                return Err(SelectorError::DuplicateKey(key.to_string()));
            }
            selectors.insert(key, value)?;
        }
        Ok(selectors)
    }
}

fn check_token(token: &str) -> Result<(), SelectorError> {
    if token.is_empty() || token.contains([',', '=']) {
        return Err(SelectorError::ReservedCharacter(token.to_string()));
    }
    Ok(())
}

impl fmt::Display for Selectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
