//! Names of clock domains.
//!
//! A `DomainKey` identifies one clock domain within an assembly. Keys are
//! used to index domains and to route per-domain edges to the logic they clock.

use std::borrow::Borrow;
use std::fmt;

/// Unique name of a clock domain, such as `sync` or `audio`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainKey {
    name: String,
}

impl DomainKey {
    /// Creates a new domain key.
    ///
    /// Any string is accepted here. Assemblies refuse to declare a domain with
    /// an empty name, so an empty key never resolves to a domain.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the domain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Borrow<str> for DomainKey {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for DomainKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
