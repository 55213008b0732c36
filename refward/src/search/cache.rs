//! Index-backed [`Searcher`], falling back to a linear walk on a miss.
//!
//! The index is advisory (see § CONCURRENCY & RESOURCE MODEL): losing it,
//! or never persisting it, only costs speed. Mutations accumulate in
//! memory for the duration of one verification call and are flushed to disk
//! only by an explicit, all-or-nothing [`CacheSearcher::commit`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rsl::{EntryId, Journal, ReferenceEntry};
use crate::search::{linear::LinearSearcher, SearchError, Searcher};
use crate::vcs::Oid;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error reading/writing cache at {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("malformed cache file: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    policy: BTreeMap<u64, Oid>,
    attestations: BTreeMap<u64, Oid>,
}

pub struct CacheSearcher<'j, J> {
    journal: &'j J,
    linear: LinearSearcher<'j, J>,
    index: RefCell<Index>,
}

impl<'j, J: Journal> CacheSearcher<'j, J> {
    pub fn new(journal: &'j J) -> Self {
        Self {
            journal,
            linear: LinearSearcher::new(journal),
            index: RefCell::new(Index::default()),
        }
    }

    pub fn load(journal: &'j J, path: &Path) -> Result<Self, CacheError> {
        let searcher = Self::new(journal);
        match fs::read(path) {
            Ok(bytes) => *searcher.index.borrow_mut() = serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::Io(path.to_owned(), e)),
        }
        Ok(searcher)
    }

    /// Flush the accumulated index to `path` in one write. Never called
    /// automatically; the verification workflow calls this once, at the end
    /// of a successful `VerifyRelativeForRef`.
    pub fn commit(&self, path: &Path) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(&*self.index.borrow())?;
        fs::write(path, bytes).map_err(|e| CacheError::Io(path.to_owned(), e))
    }

    fn lookup(
        &self,
        table: impl Fn(&Index) -> &BTreeMap<u64, Oid>,
        before_number: u64,
    ) -> Option<EntryId> {
        table(&self.index.borrow())
            .range(..=before_number)
            .next_back()
            .map(|(_, oid)| EntryId(*oid))
    }
}

impl<'j, J: Journal> Searcher for CacheSearcher<'j, J> {
    fn latest_policy_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError> {
        let before_number = self.journal.get_entry(before)?.number();
        if let Some(id) = self.lookup(|i| &i.policy, before_number) {
            return Ok(self.journal.get_entry(id)?.as_reference().cloned());
        }
        let found = self.linear.latest_policy_at_or_before(before)?;
        if let Some(entry) = &found {
            self.index
                .borrow_mut()
                .policy
                .insert(entry.number, entry.id.0);
        }
        Ok(found)
    }

    fn first_policy_entry(&self) -> Result<Option<ReferenceEntry>, SearchError> {
        self.linear.first_policy_entry()
    }

    fn policy_entries_in_range(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> Result<Vec<ReferenceEntry>, SearchError> {
        let entries = self.linear.policy_entries_in_range(first, last)?;
        let mut index = self.index.borrow_mut();
        for entry in &entries {
            index.policy.insert(entry.number, entry.id.0);
        }
        Ok(entries)
    }

    fn latest_attestations_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError> {
        let before_number = self.journal.get_entry(before)?.number();
        if let Some(id) = self.lookup(|i| &i.attestations, before_number) {
            return Ok(self.journal.get_entry(id)?.as_reference().cloned());
        }
        let found = self.linear.latest_attestations_at_or_before(before)?;
        if let Some(entry) = &found {
            self.index
                .borrow_mut()
                .attestations
                .insert(entry.number, entry.id.0);
        }
        Ok(found)
    }
}
