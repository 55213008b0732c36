//! The core verification loop: walk the RSL between two entries, tracking
//! policy/attestations state and verifying each entry for a target
//! reference against it (§4.5), including the bounded recovery protocol.

use std::collections::VecDeque;

use refward_crypto::key::Key;
use refward_crypto::principal::Principal;
use refward_crypto::threshold::{
    CreditedPrincipals, EnvelopeSource, ObjectSignatureSource, Verifier, VerifierError,
};

use crate::attestation::{AttestationKey, AttestationStore, AttestationsState};
use crate::config::PolicyRuntimeConfig;
use crate::envelope::Envelope;
use crate::policy::{GlobalRule, PolicyState};
use crate::rsl::{is_unskipped, Annotation, Entry, EntryId, Journal, ReferenceEntry};
use crate::search::Searcher;
use crate::vcs::{refs, Oid, ReadVcs, RefName};
use crate::verify::VerificationError;

/// Drives verification of one reference's history against the policy and
/// attestations in force at each point in the log.
pub struct Workflow<'a, V, J, S> {
    pub(super) vcs: &'a V,
    pub(super) journal: &'a J,
    pub(super) searcher: &'a S,
    pub(super) bootstrap_root: Vec<Principal>,
    pub(super) bootstrap_threshold: usize,
    pub(super) verify_exhaustively_default: bool,
}

impl<'a, V: ReadVcs, J: Journal, S: Searcher> Workflow<'a, V, J, S> {
    pub fn new(
        vcs: &'a V,
        journal: &'a J,
        searcher: &'a S,
        bootstrap_root: Vec<Principal>,
        bootstrap_threshold: usize,
    ) -> Self {
        Self::with_config(
            vcs,
            journal,
            searcher,
            bootstrap_root,
            bootstrap_threshold,
            &PolicyRuntimeConfig::default(),
        )
    }

    /// Like [`Workflow::new`], but reading runtime knobs (currently just
    /// [`PolicyRuntimeConfig::verify_exhaustively_default`]) from `config`
    /// instead of taking their hardcoded defaults.
    pub fn with_config(
        vcs: &'a V,
        journal: &'a J,
        searcher: &'a S,
        bootstrap_root: Vec<Principal>,
        bootstrap_threshold: usize,
        config: &PolicyRuntimeConfig,
    ) -> Self {
        Self {
            vcs,
            journal,
            searcher,
            bootstrap_root,
            bootstrap_threshold,
            verify_exhaustively_default: config.verify_exhaustively_default,
        }
    }

    /// Apply this workflow's configured exhaustiveness default to every
    /// verifier in `verifiers` before running them.
    pub(super) fn exhaustive_verifiers(&self, verifiers: Vec<Verifier>) -> Vec<Verifier> {
        verifiers
            .into_iter()
            .map(|v| v.exhaustive(self.verify_exhaustively_default))
            .collect()
    }

    /// Verify every recorded update to `target` from the reference's first
    /// appearance in the log through the current tip.
    pub fn verify_ref_full(&self, target: &RefName) -> Result<Oid, VerificationError> {
        let last = self.journal.tip()?;
        let first = self
            .first_entry_for(target)?
            .unwrap_or(last);
        self.verify_relative_for_ref(first, last, target)
    }

    /// Alias for [`Workflow::verify_ref_full`]; the common entry point a
    /// host calls with no prior verification state to resume from.
    pub fn verify_ref(&self, target: &RefName) -> Result<Oid, VerificationError> {
        self.verify_ref_full(target)
    }

    /// Verify `target` starting from a previously-verified entry, rather
    /// than replaying the reference's entire history.
    pub fn verify_ref_from_entry(
        &self,
        target: &RefName,
        start: EntryId,
    ) -> Result<Oid, VerificationError> {
        let last = self.journal.tip()?;
        self.verify_relative_for_ref(start, last, target)
    }

    /// The core loop: walk every entry between `first` and `last`,
    /// maintaining the policy/attestations state in force and verifying
    /// each entry touching `target`. Returns the last accepted commit id
    /// for `target`.
    pub fn verify_relative_for_ref(
        &self,
        first: EntryId,
        last: EntryId,
        target: &RefName,
    ) -> Result<Oid, VerificationError> {
        let mut current_policy = match self.searcher.latest_policy_at_or_before(first)? {
            Some(policy_entry) => {
                let tree = self.vcs.commit_tree_id(policy_entry.target_id)?;
                Some(PolicyState::load_initial(
                    self.vcs,
                    tree,
                    &self.bootstrap_root,
                    self.bootstrap_threshold,
                )?)
            }
            None => None,
        };
        let mut current_attestations = match self.searcher.latest_attestations_at_or_before(first)? {
            Some(entry) => {
                let tree = self.vcs.commit_tree_id(entry.target_id)?;
                Some(AttestationsState::load(self.vcs, tree)?)
            }
            None => None,
        };

        let (entries, annotations) = self.journal.get_all_between(first, last)?;
        let mut queue: VecDeque<Entry> = entries.into_iter().collect();

        let mut accepted_tip: Option<Oid> = None;
        let mut previous_entry: Option<ReferenceEntry> = None;

        while let Some(entry) = queue.pop_front() {
            let reference = match &entry {
                Entry::Propagation(_) | Entry::Annotation(_) => continue,
                Entry::Reference(r) => r.clone(),
            };

            if refs::is_policy_staging(reference.ref_name.as_str()) {
                continue;
            }
            if refs::is_policy(reference.ref_name.as_str()) {
                let tree = self.vcs.commit_tree_id(reference.target_id)?;
                current_policy = Some(match &current_policy {
                    Some(policy) => policy.verify_new_state(self.vcs, tree)?,
                    None => PolicyState::load_initial(
                        self.vcs,
                        tree,
                        &self.bootstrap_root,
                        self.bootstrap_threshold,
                    )?,
                });
                continue;
            }
            if refs::is_attestations(reference.ref_name.as_str()) {
                let tree = self.vcs.commit_tree_id(reference.target_id)?;
                current_attestations = Some(AttestationsState::load(self.vcs, tree)?);
                continue;
            }
            if reference.ref_name != *target {
                continue;
            }

            let policy = current_policy
                .as_ref()
                .ok_or_else(|| VerificationError::PolicyNotFound(target.clone()))?;
            let from_id = previous_entry
                .as_ref()
                .map(|p| p.target_id)
                .unwrap_or(Oid::ZERO);

            match self.verify_entry(policy, current_attestations.as_ref(), &reference, from_id) {
                Ok(()) => {
                    accepted_tip = Some(reference.target_id);
                    previous_entry = Some(reference);
                }
                Err(err) => {
                    if is_unskipped(reference.id, &annotations) {
                        return Err(err);
                    }
                    let fix = self.recover(
                        target,
                        err,
                        previous_entry.as_ref(),
                        &annotations,
                        &mut queue,
                    )?;
                    accepted_tip = Some(fix.target_id);
                    previous_entry = Some(fix);
                }
            }
        }

        match accepted_tip {
            Some(tip) => Ok(tip),
            None => Ok(self.vcs.get_reference(target)?),
        }
    }

    fn first_entry_for(&self, target: &RefName) -> Result<Option<EntryId>, VerificationError> {
        let tip = self.journal.tip()?;
        let mut cursor = Some(tip);
        let mut earliest = None;
        while let Some(id) = cursor {
            let entry = self.journal.get_entry(id)?;
            if matches!(entry.as_reference(), Some(r) if r.ref_name == *target) {
                earliest = Some(id);
            }
            let parent = entry.parent();
            cursor = (!parent.0.is_zero()).then_some(parent);
        }
        Ok(earliest)
    }

    /// The bounded recovery protocol: locate the last entry for `target`
    /// that was accepted before the failing one, and scan forward for a
    /// later entry whose target tree reproduces that last-good state.
    /// Every entry for `target` encountered in between must already be
    /// skip-annotated; entries for other references are deferred and
    /// replayed, in order, once a fix is found.
    fn recover(
        &self,
        target: &RefName,
        original_err: VerificationError,
        last_good: Option<&ReferenceEntry>,
        annotations: &std::collections::BTreeMap<EntryId, Annotation>,
        queue: &mut VecDeque<Entry>,
    ) -> Result<ReferenceEntry, VerificationError> {
        let last_good_tree = match last_good {
            Some(entry) => {
                if !is_unskipped(entry.id, annotations) {
                    return Err(VerificationError::LastGoodEntryIsSkipped(target.clone()));
                }
                self.vcs.commit_tree_id(entry.target_id)?
            }
            None => return Err(original_err),
        };

        let mut deferred: Vec<Entry> = Vec::new();
        let mut fix: Option<ReferenceEntry> = None;

        while let Some(entry) = queue.pop_front() {
            match entry.as_reference() {
                Some(r) if r.ref_name == *target && fix.is_none() => {
                    let skipped = !is_unskipped(r.id, annotations);
                    if skipped {
                        deferred.push(entry);
                        continue;
                    }
                    let candidate_tree = self.vcs.commit_tree_id(r.target_id)?;
                    if candidate_tree == last_good_tree {
                        fix = Some(r.clone());
                    } else {
                        return Err(VerificationError::InvalidEntryNotSkipped(r.target_id));
                    }
                }
                _ => deferred.push(entry),
            }
        }

        match fix {
            Some(f) => {
                for entry in deferred.into_iter().rev() {
                    queue.push_front(entry);
                }
                Ok(f)
            }
            None => Err(original_err),
        }
    }

    fn verify_entry(
        &self,
        policy: &PolicyState,
        attestations: Option<&AttestationsState>,
        entry: &ReferenceEntry,
        from_id: Oid,
    ) -> Result<(), VerificationError> {
        if refs::is_tag(entry.ref_name.as_str()) {
            let (tag_commit, credited) = self.verify_tag(policy, attestations, entry, from_id)?;
            return self.check_global_rules(
                policy,
                &entry.ref_name,
                from_id,
                tag_commit,
                &credited,
                false,
            );
        }

        let to_tree = self.vcs.commit_tree_id(entry.target_id)?;
        let from_tree = if from_id.is_zero() {
            Oid::ZERO
        } else {
            self.vcs.commit_tree_id(from_id)?
        };
        let key = AttestationKey::new(entry.ref_name.clone(), from_tree, to_tree);
        let authorization = attestations.and_then(|a| a.get_reference_authorization_for(&key));
        let app = policy.approval_app.as_ref().and_then(|app| {
            attestations
                .and_then(|a| a.get_pull_request_approval_attestation_for(&app.name, &key))
                .map(|(_, approvers)| (app.name.as_str(), approvers))
        });

        let verifiers = self.exhaustive_verifiers(policy.verifiers_for_ref(&entry.ref_name));
        let (verifier_name, mut all_credited, _) =
            self.verify_namespace(&verifiers, entry.target_id, authorization, app, None, false)?;

        self.check_global_rules(
            policy,
            &entry.ref_name,
            from_id,
            entry.target_id,
            &all_credited,
            false,
        )?;

        if policy.has_file_rule {
            let commits = if from_id.is_zero() {
                vec![entry.target_id]
            } else {
                self.vcs.commits_between(from_id, entry.target_id)?
            };
            for commit in commits {
                for path in self.vcs.changed_paths(commit)? {
                    let file_verifiers = self.exhaustive_verifiers(policy.verifiers_for_path(&path));
                    if file_verifiers.is_empty() {
                        continue;
                    }
                    // Reusing the ref-level verifier's name short-circuits
                    // re-checking the same commit's own signature for every
                    // file it touches.
                    let (_, credited, _) = self.verify_namespace(
                        &file_verifiers,
                        commit,
                        authorization,
                        app,
                        Some(&verifier_name),
                        false,
                    )?;
                    all_credited.merge(&credited);
                }
            }
        }

        Ok(())
    }

    /// Run `verifiers` in declaration order against one object/envelope
    /// pair, returning the name of the first satisfied verifier, the union
    /// of every principal credited along the way (used by global-rule
    /// re-checks), and whether acceptance only held because `mergeable`
    /// relaxed the threshold by one.
    pub(super) fn verify_namespace(
        &self,
        verifiers: &[Verifier],
        object_id: Oid,
        authorization: Option<&Envelope>,
        app: Option<(&str, &[String])>,
        trusted_hint: Option<&str>,
        mergeable: bool,
    ) -> Result<(String, CreditedPrincipals, bool), VerificationError> {
        if verifiers.is_empty() {
            return Err(VerificationError::VerifierConditionsUnmet(
                VerifierError::ConditionsUnmet("<unmatched>".into(), 0, 1),
            ));
        }

        let object_src = object_signature_source(self.vcs, object_id);
        let object_src_ref = object_src.as_ref().map(|s| s as &dyn ObjectSignatureSource);
        let env_src = authorization.map(|e| e as &dyn EnvelopeSource);

        if let Some(hint) = trusted_hint {
            if let Some(v) = verifiers.iter().find(|v| v.name == hint) {
                let credited = v.accumulate_credits(object_src_ref, env_src);
                return Ok((v.name.clone(), credited, false));
            }
        }

        let mut union = CreditedPrincipals::default();
        let mut last_err = None;
        for verifier in verifiers {
            let mut credited = verifier.accumulate_credits(object_src_ref, env_src);
            if credited.len() < verifier.threshold {
                if let Some((app_name, approvers)) = app {
                    credited.merge(&verifier.credit_associated_identities(app_name, approvers));
                }
            }
            union.merge(&credited);

            if credited.len() >= verifier.threshold {
                return Ok((verifier.name.clone(), union, false));
            }
            if mergeable && verifier.threshold > 0 && credited.len() + 1 >= verifier.threshold {
                return Ok((verifier.name.clone(), union, true));
            }
            last_err = Some(VerifierError::ConditionsUnmet(
                verifier.name.clone(),
                credited.len(),
                verifier.threshold,
            ));
        }

        Err(VerificationError::VerifierConditionsUnmet(last_err.unwrap_or(
            VerifierError::ConditionsUnmet("<unmatched>".into(), 0, 1),
        )))
    }

    pub(super) fn check_global_rules(
        &self,
        policy: &PolicyState,
        ref_name: &RefName,
        from_id: Oid,
        to_id: Oid,
        credited: &CreditedPrincipals,
        mergeable: bool,
    ) -> Result<(), VerificationError> {
        for tagged in &policy.global_rules {
            match &tagged.rule {
                GlobalRule::Threshold { pattern, threshold } => {
                    if !pattern.matches_ref(ref_name) {
                        continue;
                    }
                    let required = if mergeable {
                        threshold.saturating_sub(1)
                    } else {
                        *threshold
                    };
                    if credited.len() < required {
                        let name = match &tagged.origin {
                            Some(origin) => format!("global-threshold@{origin}"),
                            None => "global-threshold".to_owned(),
                        };
                        return Err(VerificationError::VerifierConditionsUnmet(
                            VerifierError::ConditionsUnmet(name, credited.len(), required),
                        ));
                    }
                }
                GlobalRule::BlockForcePushes { pattern } => {
                    if mergeable || from_id.is_zero() || !pattern.matches_ref(ref_name) {
                        continue;
                    }
                    if !self.vcs.knows_commit(to_id, from_id)? {
                        return Err(VerificationError::InvalidRslEntry(format!(
                            "'{ref_name}' was force-pushed, violating a global block-force-pushes rule"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

pub(super) struct ObjectSig<'v, V> {
    vcs: &'v V,
    id: Oid,
}

impl<'v, V: ReadVcs> ObjectSignatureSource for ObjectSig<'v, V> {
    fn verify_with(&self, key: &Key) -> bool {
        self.vcs.verify_signature(self.id, key)
    }
}

pub(super) fn object_signature_source<V: ReadVcs>(vcs: &V, id: Oid) -> Option<ObjectSig<'_, V>> {
    (!id.is_zero()).then_some(ObjectSig { vcs, id })
}
