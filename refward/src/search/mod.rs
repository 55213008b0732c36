//! Locating the policy/attestations entry in force at a given point in the
//! log (see §4.2).

pub mod cache;
pub mod linear;

pub use cache::CacheSearcher;
pub use linear::LinearSearcher;

use thiserror::Error;

use crate::rsl::{EntryId, ReferenceEntry, RslError};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("rsl error: {0}")]
    Rsl(#[from] RslError),
}

/// Finds policy/attestations entries relative to a given RSL entry.
///
/// Absence of a policy before the very first policy entry in the log is not
/// an error: callers distinguish "no policy yet" (`Ok(None)`) from a broken
/// log (`Err`).
pub trait Searcher {
    fn latest_policy_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError>;

    fn first_policy_entry(&self) -> Result<Option<ReferenceEntry>, SearchError>;

    fn policy_entries_in_range(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> Result<Vec<ReferenceEntry>, SearchError>;

    fn latest_attestations_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError>;
}
