//! Principals: named identities that own one or more verification keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// A principal's stable id, as declared in a rule file's principal table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A third-party identity attributable to this principal, e.g. a forge
/// username. Keyed by issuer (the name of the approval app that recognizes
/// it) so that one principal can be known by different handles on
/// different code-review systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedIdentity {
    pub issuer: String,
    pub identity: String,
}

/// An identity with a stable id and a set of underlying verification keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub keys: Vec<Key>,
    associated_identities: BTreeMap<String, String>,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, keys: Vec<Key>) -> Self {
        Self {
            id: id.into(),
            keys,
            associated_identities: BTreeMap::new(),
        }
    }

    pub fn with_associated_identities(
        mut self,
        identities: impl IntoIterator<Item = AssociatedIdentity>,
    ) -> Self {
        for AssociatedIdentity { issuer, identity } in identities {
            self.associated_identities.insert(issuer, identity);
        }
        self
    }

    /// The identity this principal is known by on `issuer`'s system, if any.
    pub fn associated_identity(&self, issuer: &str) -> Option<&str> {
        self.associated_identities.get(issuer).map(String::as_str)
    }

    /// Whether `identity`, as attributed to `issuer`, names this principal.
    pub fn matches_associated_identity(&self, issuer: &str, identity: &str) -> bool {
        self.associated_identity(issuer) == Some(identity)
    }
}
