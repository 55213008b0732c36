//! Backward-walk [`Searcher`] implementation: no index, always correct.

use crate::rsl::{Entry, EntryId, Journal, ReferenceEntry};
use crate::search::{SearchError, Searcher};
use crate::vcs::refs;
use crate::vcs::RefName;

pub struct LinearSearcher<'j, J> {
    journal: &'j J,
}

impl<'j, J: Journal> LinearSearcher<'j, J> {
    pub fn new(journal: &'j J) -> Self {
        Self { journal }
    }

    fn latest_for_ref(
        &self,
        ref_name: &str,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError> {
        let target = RefName::new(ref_name);
        let entry = self.journal.get_latest(
            &|e: &Entry| matches!(e.as_reference(), Some(r) if r.ref_name == target),
            Some(before),
        )?;
        Ok(entry.and_then(|e| e.as_reference().cloned()))
    }
}

impl<'j, J: Journal> Searcher for LinearSearcher<'j, J> {
    fn latest_policy_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError> {
        self.latest_for_ref(refs::POLICY, before)
    }

    fn first_policy_entry(&self) -> Result<Option<ReferenceEntry>, SearchError> {
        let tip = self.journal.tip()?;
        let mut cursor = Some(tip);
        let mut earliest = None;
        while let Some(id) = cursor {
            let entry = self.journal.get_entry(id)?;
            if let Some(r) = entry.as_reference() {
                if r.ref_name.as_str() == refs::POLICY {
                    earliest = Some(r.clone());
                }
            }
            let parent = entry.parent();
            cursor = (!parent.0.is_zero()).then_some(parent);
        }
        Ok(earliest)
    }

    fn policy_entries_in_range(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> Result<Vec<ReferenceEntry>, SearchError> {
        let (entries, _) = self
            .journal
            .get_range(first, last, &RefName::new(refs::POLICY))?;
        Ok(entries
            .into_iter()
            .filter_map(|e| e.as_reference().cloned())
            .collect())
    }

    fn latest_attestations_at_or_before(
        &self,
        before: EntryId,
    ) -> Result<Option<ReferenceEntry>, SearchError> {
        self.latest_for_ref(refs::ATTESTATIONS, before)
    }
}

#[cfg(test)]
mod tests {
    use crate::rsl::GitJournal;
    use crate::test::MemVcs;

    use super::*;

    /// Two policy entries separated by an unrelated reference entry:
    /// `e1` (policy A), `e2` (refs/heads/main), `e3` (policy B).
    fn build_journal(vcs: &MemVcs) -> (EntryId, EntryId, EntryId) {
        let e1 = vcs.add_rsl_entry(
            None,
            format!("rsl-entry: reference\nnumber: 1\nref: {}\ntarget: 1\n", refs::POLICY),
        );
        let e2 = vcs.add_rsl_entry(
            Some(e1),
            "rsl-entry: reference\nnumber: 2\nref: refs/heads/main\ntarget: 2\n".to_owned(),
        );
        let e3 = vcs.add_rsl_entry(
            Some(e2),
            format!("rsl-entry: reference\nnumber: 3\nref: {}\ntarget: 3\n", refs::POLICY),
        );
        vcs.set_ref(RefName::new(refs::RSL), e3);
        (EntryId(e1), EntryId(e2), EntryId(e3))
    }

    #[test]
    fn latest_policy_at_or_before_skips_unrelated_entries() {
        let vcs = MemVcs::new();
        let (e1, e2, e3) = build_journal(&vcs);
        let journal = GitJournal::new(&vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);

        assert_eq!(searcher.latest_policy_at_or_before(e1).unwrap().unwrap().id, e1);
        assert_eq!(searcher.latest_policy_at_or_before(e2).unwrap().unwrap().id, e1);
        assert_eq!(searcher.latest_policy_at_or_before(e3).unwrap().unwrap().id, e3);
    }

    #[test]
    fn first_policy_entry_is_the_earliest_one() {
        let vcs = MemVcs::new();
        let (e1, _, _) = build_journal(&vcs);
        let journal = GitJournal::new(&vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);

        assert_eq!(searcher.first_policy_entry().unwrap().unwrap().id, e1);
    }

    #[test]
    fn policy_entries_in_range_excludes_non_policy_entries() {
        let vcs = MemVcs::new();
        let (e1, _, e3) = build_journal(&vcs);
        let journal = GitJournal::new(&vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);

        let entries = searcher.policy_entries_in_range(e1, e3).unwrap();
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![e1, e3]);
    }
}
