//! Provider API keys supplied by the user to provision an agent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A required secret was absent or blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required secret: {0}")]
pub struct MissingSecret(pub String);

/// Mapping of provider name (e.g. `cerebrasKey`) to API key.
///
/// Serializes as a flat JSON object so it can be forwarded verbatim. `Debug`
/// only ever shows provider names.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secrets(BTreeMap<String, String>);

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the key for `provider`.
    pub fn with(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.0.insert(provider.into(), key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Provider names, in sorted order.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Checks that each of `required` is present with a non-blank key.
    pub fn require_non_empty<S: AsRef<str>>(&self, required: &[S]) -> Result<(), MissingSecret> {
        for name in required {
            let name = name.as_ref();
            match self.0.get(name) {
                Some(key) if !key.trim().is_empty() => {}
                _ => return Err(MissingSecret(name.to_string())),
            }
        }
        Ok(())
    }

    /// Iterates over `(provider, key)` pairs.
    ///
    /// Only for handing keys to the process that consumes them.
    pub fn expose(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers()).finish()
    }
}
