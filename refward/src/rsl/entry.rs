//! RSL entry variants (see DATA MODEL / RSL entry).

use std::fmt;

use crate::vcs::{Oid, RefName};

/// An RSL entry's own object id. A thin wrapper over [`Oid`] so entry ids
/// and the objects they point at are not accidentally interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub Oid);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Oid> for EntryId {
    fn from(id: Oid) -> Self {
        Self(id)
    }
}

impl From<EntryId> for Oid {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

/// A reference-update entry: "`ref_name` now points at `target_id`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub number: u64,
    pub id: EntryId,
    pub parent: EntryId,
    pub ref_name: RefName,
    pub target_id: Oid,
}

/// A retroactive annotation over prior entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub number: u64,
    pub id: EntryId,
    pub parent: EntryId,
    pub targets: Vec<EntryId>,
    /// When true, every targeted entry is revoked.
    pub skip: bool,
    pub message: Option<String>,
}

/// A record that a subtree mirror of an upstream repository's RSL was
/// advanced. Treated as a no-op by verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationEntry {
    pub number: u64,
    pub id: EntryId,
    pub parent: EntryId,
    pub upstream_name: String,
    pub upstream_entry: EntryId,
}

/// One of the three tagged variants an RSL commit can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Reference(ReferenceEntry),
    Annotation(Annotation),
    Propagation(PropagationEntry),
}

impl Entry {
    pub fn number(&self) -> u64 {
        match self {
            Entry::Reference(e) => e.number,
            Entry::Annotation(e) => e.number,
            Entry::Propagation(e) => e.number,
        }
    }

    pub fn id(&self) -> EntryId {
        match self {
            Entry::Reference(e) => e.id,
            Entry::Annotation(e) => e.id,
            Entry::Propagation(e) => e.id,
        }
    }

    pub fn parent(&self) -> EntryId {
        match self {
            Entry::Reference(e) => e.parent,
            Entry::Annotation(e) => e.parent,
            Entry::Propagation(e) => e.parent,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceEntry> {
        match self {
            Entry::Reference(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            Entry::Annotation(e) => Some(e),
            _ => None,
        }
    }

    pub fn ref_name(&self) -> Option<&RefName> {
        self.as_reference().map(|e| &e.ref_name)
    }
}
