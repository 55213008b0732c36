//! Mergeable-preview verification (§4.5, the "is this PR ready to merge"
//! scenario): checks a hypothetical merge tree against policy without an
//! RSL entry for it existing yet.

use crate::attestation::{AttestationKey, AttestationsState};
use crate::policy::PolicyState;
use crate::vcs::{refs, Oid, ReadVcs, RefName};
use crate::verify::{VerificationError, Workflow};

impl<V: ReadVcs, J: crate::rsl::Journal, S: crate::search::Searcher> Workflow<'_, V, J, S> {
    /// Preview whether merging `feature_id` into `target_ref` (currently at
    /// `from_id`) would satisfy policy. Returns whether an authorized RSL
    /// entry is still required to finalize the merge: `true` once every
    /// applicable verifier is one credited signature short of its
    /// threshold, `false` once policy is already fully satisfied.
    pub fn verify_mergeable(
        &self,
        target_ref: &RefName,
        from_id: Oid,
        feature_id: Oid,
    ) -> Result<bool, VerificationError> {
        if refs::is_tag(target_ref.as_str()) {
            return Err(VerificationError::CannotVerifyMergeableForTagRef);
        }

        let tip = self.journal.tip()?;
        let policy_entry = self
            .searcher
            .latest_policy_at_or_before(tip)?
            .ok_or_else(|| VerificationError::PolicyNotFound(target_ref.clone()))?;
        let policy_tree = self.vcs.commit_tree_id(policy_entry.target_id)?;
        let policy = PolicyState::load_initial(
            self.vcs,
            policy_tree,
            &self.bootstrap_root,
            self.bootstrap_threshold,
        )?;

        let attestations = match self.searcher.latest_attestations_at_or_before(tip)? {
            Some(entry) => {
                let tree = self.vcs.commit_tree_id(entry.target_id)?;
                Some(AttestationsState::load(self.vcs, tree)?)
            }
            None => None,
        };

        let merge_tree = self.vcs.merge_tree(from_id, feature_id)?;
        let from_tree = if from_id.is_zero() {
            Oid::ZERO
        } else {
            self.vcs.commit_tree_id(from_id)?
        };
        let key = AttestationKey::new(target_ref.clone(), from_tree, merge_tree);
        let authorization = attestations.as_ref().and_then(|a| a.get_reference_authorization_for(&key));
        let app = policy.approval_app.as_ref().and_then(|app| {
            attestations
                .as_ref()
                .and_then(|a| a.get_pull_request_approval_attestation_for(&app.name, &key))
                .map(|(_, approvers)| (app.name.as_str(), approvers))
        });

        let verifiers = self.exhaustive_verifiers(policy.verifiers_for_ref(target_ref));
        let (_, mut credited, mut needs_rsl_sig) =
            self.verify_namespace(&verifiers, Oid::ZERO, authorization, app, None, true)?;

        if policy.has_file_rule {
            let commits = if from_id.is_zero() {
                vec![feature_id]
            } else {
                self.vcs.commits_between(from_id, feature_id)?
            };
            for commit in commits {
                for path in self.vcs.changed_paths(commit)? {
                    let file_verifiers = self.exhaustive_verifiers(policy.verifiers_for_path(&path));
                    if file_verifiers.is_empty() {
                        continue;
                    }
                    let (_, file_credited, file_needs_rsl_sig) = self.verify_namespace(
                        &file_verifiers,
                        Oid::ZERO,
                        authorization,
                        app,
                        None,
                        true,
                    )?;
                    credited.merge(&file_credited);
                    needs_rsl_sig = needs_rsl_sig || file_needs_rsl_sig;
                }
            }
        }

        self.check_global_rules(&policy, target_ref, from_id, merge_tree, &credited, true)?;

        Ok(needs_rsl_sig)
    }
}
