//! Traversal over the RSL (see design doc §4.1).

use std::collections::BTreeMap;

use crate::rsl::entry::{Annotation, Entry, EntryId, PropagationEntry, ReferenceEntry};
use crate::rsl::RslError;
use crate::vcs::{CommitLog, Oid, RefName};

/// Read-only access to the RSL chain.
///
/// Implementations walk parent pointers backward; there is no forward
/// index other than what [`crate::search::Searcher`] builds on top.
pub trait Journal {
    fn get_entry(&self, id: EntryId) -> Result<Entry, RslError>;

    /// Walk backward from (and including) `before`, returning the first
    /// entry for which `predicate` holds. `before = None` starts from the
    /// RSL tip.
    fn get_latest(
        &self,
        predicate: &dyn Fn(&Entry) -> bool,
        before: Option<EntryId>,
    ) -> Result<Option<Entry>, RslError>;

    /// All entries for `ref_name` between `first` and `last` (inclusive,
    /// chronological order), together with every annotation targeting any
    /// of them.
    fn get_range(
        &self,
        first: EntryId,
        last: EntryId,
        ref_name: &RefName,
    ) -> Result<(Vec<Entry>, BTreeMap<EntryId, Annotation>), RslError>;

    /// The RSL tip (highest-numbered entry).
    fn tip(&self) -> Result<EntryId, RslError>;

    /// Every entry between `first` and `last` (inclusive, chronological
    /// order) regardless of which reference it names, together with every
    /// annotation in that range. Used by the verification workflow, which
    /// must see policy/attestations/propagation entries interleaved with a
    /// specific reference's entries; [`Journal::get_range`] alone cannot
    /// express that since it is filtered to one reference.
    fn get_all_between(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> Result<(Vec<Entry>, BTreeMap<EntryId, Annotation>), RslError>;
}

/// Whether `entry` is revoked by any `skip=true` annotation in `annotations`.
pub fn is_unskipped(entry_id: EntryId, annotations: &BTreeMap<EntryId, Annotation>) -> bool {
    !annotations
        .values()
        .any(|a| a.skip && a.targets.contains(&entry_id))
}

/// A [`Journal`] backed by commits on a dedicated git reference.
///
/// Each commit's message is a structured record: a first line naming the
/// variant, followed by `key: value` fields. The parent chain encodes log
/// order; entry numbers are carried explicitly in the message rather than
/// derived from commit depth, so a shallow clone can still be validated.
pub struct GitJournal<'v, V> {
    vcs: &'v V,
    rsl_ref: RefName,
}

impl<'v, V: CommitLog> GitJournal<'v, V> {
    pub fn new(vcs: &'v V, rsl_ref: RefName) -> Self {
        Self { vcs, rsl_ref }
    }

    fn parse(&self, id: Oid, parent: Oid, message: &str) -> Result<Entry, RslError> {
        let mut lines = message.lines();
        let discriminator = lines
            .next()
            .ok_or(RslError::Malformed(id, "empty entry message"))?;

        let mut fields: BTreeMap<&str, &str> = BTreeMap::new();
        let mut free_text_lines: Vec<&str> = Vec::new();
        let mut in_free_text = false;
        for line in lines {
            if in_free_text {
                free_text_lines.push(line);
                continue;
            }
            if line.is_empty() {
                in_free_text = true;
                continue;
            }
            if let Some((k, v)) = line.split_once(':') {
                fields.insert(k.trim(), v.trim());
            }
        }

        let number: u64 = fields
            .get("number")
            .ok_or(RslError::Malformed(id, "missing 'number' field"))?
            .parse()
            .map_err(|_| RslError::Malformed(id, "'number' is not an integer"))?;

        match discriminator.trim() {
            "rsl-entry: reference" => {
                let ref_name = fields
                    .get("ref")
                    .ok_or(RslError::Malformed(id, "missing 'ref' field"))?;
                let target: Oid = fields
                    .get("target")
                    .ok_or(RslError::Malformed(id, "missing 'target' field"))?
                    .parse()
                    .map_err(|_| RslError::Malformed(id, "'target' is not a valid object id"))?;

                Ok(Entry::Reference(ReferenceEntry {
                    number,
                    id: EntryId(id),
                    parent: EntryId(parent),
                    ref_name: RefName::new(*ref_name),
                    target_id: target,
                }))
            }
            "rsl-entry: annotation" => {
                let targets = fields
                    .get("targets")
                    .ok_or(RslError::Malformed(id, "missing 'targets' field"))?
                    .split(',')
                    .map(|s| s.trim().parse::<Oid>().map(EntryId))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| RslError::Malformed(id, "'targets' contains an invalid id"))?;
                let skip = fields.get("skip").map(|s| *s == "true").unwrap_or(false);
                let message = (!free_text_lines.is_empty())
                    .then(|| free_text_lines.join("\n").trim().to_owned())
                    .filter(|s| !s.is_empty());

                Ok(Entry::Annotation(Annotation {
                    number,
                    id: EntryId(id),
                    parent: EntryId(parent),
                    targets,
                    skip,
                    message,
                }))
            }
            "rsl-entry: propagation" => {
                let upstream_name = fields
                    .get("upstream-name")
                    .ok_or(RslError::Malformed(id, "missing 'upstream-name' field"))?;
                let upstream_entry: Oid = fields
                    .get("upstream-entry")
                    .ok_or(RslError::Malformed(id, "missing 'upstream-entry' field"))?
                    .parse()
                    .map_err(|_| RslError::Malformed(id, "'upstream-entry' is not a valid id"))?;

                Ok(Entry::Propagation(PropagationEntry {
                    number,
                    id: EntryId(id),
                    parent: EntryId(parent),
                    upstream_name: upstream_name.to_string(),
                    upstream_entry: EntryId(upstream_entry),
                }))
            }
            other => {
                log::warn!("unrecognized rsl entry discriminator: {other}");
                Err(RslError::Malformed(id, "unrecognized entry discriminator"))
            }
        }
    }

    fn load(&self, id: Oid) -> Result<Entry, RslError> {
        let parent = self
            .vcs
            .parent_of(id)
            .map_err(RslError::Vcs)?
            .unwrap_or(Oid::ZERO);
        let message = self.vcs.message_of(id).map_err(RslError::Vcs)?;
        self.parse(id, parent, &message)
    }
}

impl<'v, V: CommitLog> Journal for GitJournal<'v, V> {
    fn get_entry(&self, id: EntryId) -> Result<Entry, RslError> {
        self.load(id.0)
    }

    fn get_latest(
        &self,
        predicate: &dyn Fn(&Entry) -> bool,
        before: Option<EntryId>,
    ) -> Result<Option<Entry>, RslError> {
        let mut cursor = match before {
            Some(id) => id.0,
            None => self
                .vcs
                .reference_tip(&self.rsl_ref)
                .map_err(RslError::Vcs)?,
        };

        loop {
            if cursor.is_zero() {
                return Ok(None);
            }
            let entry = self.load(cursor)?;
            if predicate(&entry) {
                return Ok(Some(entry));
            }
            cursor = entry.parent().0;
        }
    }

    fn get_range(
        &self,
        first: EntryId,
        last: EntryId,
        ref_name: &RefName,
    ) -> Result<(Vec<Entry>, BTreeMap<EntryId, Annotation>), RslError> {
        let walked = self.walk_range(first, last)?;

        let matching_ids: std::collections::BTreeSet<EntryId> = walked
            .iter()
            .filter(|e| e.ref_name() == Some(ref_name))
            .map(|e| e.id())
            .collect();

        let mut annotations = BTreeMap::new();
        for entry in &walked {
            if let Entry::Annotation(a) = entry {
                if a.targets.iter().any(|t| matching_ids.contains(t)) {
                    annotations.insert(a.id, a.clone());
                }
            }
        }

        let entries = walked
            .into_iter()
            .filter(|e| matching_ids.contains(&e.id()))
            .collect();

        Ok((entries, annotations))
    }

    fn get_all_between(
        &self,
        first: EntryId,
        last: EntryId,
    ) -> Result<(Vec<Entry>, BTreeMap<EntryId, Annotation>), RslError> {
        let walked = self.walk_range(first, last)?;
        let mut annotations = BTreeMap::new();
        for entry in &walked {
            if let Entry::Annotation(a) = entry {
                annotations.insert(a.id, a.clone());
            }
        }
        Ok((walked, annotations))
    }

    fn tip(&self) -> Result<EntryId, RslError> {
        self.vcs
            .reference_tip(&self.rsl_ref)
            .map(EntryId)
            .map_err(RslError::Vcs)
    }
}

impl<'v, V: CommitLog> GitJournal<'v, V> {
    fn walk_range(&self, first: EntryId, last: EntryId) -> Result<Vec<Entry>, RslError> {
        let mut walked = Vec::new();
        let mut cursor = last.0;
        loop {
            let entry = self.load(cursor)?;
            let id = entry.id();
            walked.push(entry);
            if id == first {
                break;
            }
            let parent = walked.last().expect("just pushed").parent();
            if parent.0.is_zero() {
                return Err(RslError::EntryNotFound(first.0));
            }
            cursor = parent.0;
        }
        walked.reverse();
        Ok(walked)
    }
}
