//! Capability tokens for tool access.
//!
//! A tool may only run if the session holds every capability it declares.
//! Capabilities are granted when the runtime starts and are never elevated
//! while a query is running.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// An opaque capability token.
///
/// Names are namespaced by resource: "weather:read", "shell:exec".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The capabilities granted to one session.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    inner: HashSet<Capability>,
}

impl CapabilitySet {
    /// Build a set from plain capability names, as they appear in config.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(Capability::new).collect()
    }

    pub fn grant(&mut self, capability: Capability) {
        self.inner.insert(capability);
    }

    pub fn has(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }

    /// Capability names in sorted order, for policy requests and logs.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|c| c.0.clone()).collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
