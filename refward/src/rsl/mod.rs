//! The Reference State Log: an append-only, hash-linked journal of
//! reference updates and annotations.
//!
//! Every [`Entry`] carries a monotonic, gap-free ordinal (`number`), its own
//! object id, and the id of its predecessor (`parent`) — the RSL is a
//! chain, never a tree, from this crate's point of view. [`journal`]
//! exposes the only way to walk it.

mod entry;
mod journal;

pub use entry::{Annotation, Entry, EntryId, ReferenceEntry};
pub use journal::{is_unskipped, GitJournal, Journal};

use thiserror::Error;

use crate::vcs::{Oid, RefName};

#[derive(Debug, Error)]
pub enum RslError {
    #[error("rsl entry not found: {0}")]
    EntryNotFound(Oid),
    #[error("malformed rsl entry at {0}: {1}")]
    Malformed(Oid, &'static str),
    #[error("vcs error: {0}")]
    Vcs(#[from] crate::vcs::VcsError),
    #[error("annotation at {0} targets unknown entry {1}")]
    DanglingAnnotationTarget(Oid, Oid),
    #[error("reference '{0}' has no entries")]
    NoEntriesForRef(RefName),
}
