//! In-memory test doubles for the VCS and RSL, used to exercise the
//! verification workflow end to end without a real git repository.
//!
//! Object ids here are simply a monotonic counter; nothing below this
//! module cares how an id was produced, only that it is stable and
//! comparable.

use std::cell::RefCell;
use std::collections::BTreeMap;

use refward_crypto::key::{Key, KeyId};
use refward_crypto::principal::{Principal, PrincipalId};
use refward_crypto::test::MockSigner;
use refward_crypto::{PublicKey, Signer};

use crate::vcs::{CommitLog, Oid, ReadVcs, RefName, VcsError};

#[derive(Default)]
pub struct MemVcs {
    next_id: RefCell<u64>,
    blobs: RefCell<BTreeMap<Oid, Vec<u8>>>,
    trees: RefCell<BTreeMap<Oid, BTreeMap<String, Oid>>>,
    commit_trees: RefCell<BTreeMap<Oid, Oid>>,
    commit_parents: RefCell<BTreeMap<Oid, Oid>>,
    commit_messages: RefCell<BTreeMap<Oid, String>>,
    signatures: RefCell<BTreeMap<Oid, Vec<(KeyId, Vec<u8>)>>>,
    refs: RefCell<BTreeMap<RefName, Oid>>,
}

impl MemVcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&self) -> Oid {
        let mut counter = self.next_id.borrow_mut();
        *counter += 1;
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&counter.to_be_bytes());
        Oid::from_bytes(&bytes)
    }

    pub fn add_blob(&self, content: impl Into<Vec<u8>>) -> Oid {
        let id = self.fresh_id();
        self.blobs.borrow_mut().insert(id, content.into());
        id
    }

    /// A tree with exactly the given exact-path -> blob mappings; paths are
    /// matched verbatim by `resolve_path`/`list_tree`, with no real
    /// directory structure underneath.
    pub fn add_tree(&self, entries: impl IntoIterator<Item = (String, Oid)>) -> Oid {
        let id = self.fresh_id();
        self.trees.borrow_mut().insert(id, entries.into_iter().collect());
        id
    }

    /// A commit carrying `tree`, optionally signed by `signer` under
    /// `key_id` (the signed message is the commit's own id bytes, a
    /// stand-in for the canonical commit encoding a real backend signs).
    pub fn add_commit(
        &self,
        parent: Option<Oid>,
        tree: Oid,
        signer: Option<(&MockSigner, KeyId)>,
    ) -> Oid {
        let id = self.fresh_id();
        self.commit_trees.borrow_mut().insert(id, tree);
        if let Some(parent) = parent {
            self.commit_parents.borrow_mut().insert(id, parent);
        }
        if let Some((signer, key_id)) = signer {
            let sig = signer.sign(id.as_bytes());
            self.signatures
                .borrow_mut()
                .entry(id)
                .or_default()
                .push((key_id, sig.as_ref().to_vec()));
        }
        id
    }

    /// An RSL entry commit: no tree, just a parent pointer and a message
    /// in the structured form [`crate::rsl::GitJournal`] parses.
    pub fn add_rsl_entry(&self, parent: Option<Oid>, message: impl Into<String>) -> Oid {
        let id = self.fresh_id();
        if let Some(parent) = parent {
            self.commit_parents.borrow_mut().insert(id, parent);
        }
        self.commit_messages.borrow_mut().insert(id, message.into());
        id
    }

    pub fn set_ref(&self, name: RefName, target: Oid) {
        self.refs.borrow_mut().insert(name, target);
    }
}

impl ReadVcs for MemVcs {
    fn read_object(&self, id: Oid) -> Result<Vec<u8>, VcsError> {
        self.blobs.borrow().get(&id).cloned().ok_or(VcsError::NotFound(id))
    }

    fn resolve_path(&self, tree: Oid, path: &str) -> Result<Option<Oid>, VcsError> {
        Ok(self.trees.borrow().get(&tree).and_then(|t| t.get(path).copied()))
    }

    fn list_tree(&self, tree: Oid, prefix: &str) -> Result<Vec<String>, VcsError> {
        let with_slash = format!("{prefix}/");
        Ok(self
            .trees
            .borrow()
            .get(&tree)
            .map(|t| {
                t.keys()
                    .filter(|p| p.starts_with(&with_slash))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn verify_signature(&self, id: Oid, key: &Key) -> bool {
        self.signatures
            .borrow()
            .get(&id)
            .into_iter()
            .flatten()
            .any(|(kid, sig)| *kid == key.id && key.verify(id.as_bytes(), sig).is_ok())
    }

    fn commit_tree_id(&self, commit: Oid) -> Result<Oid, VcsError> {
        self.commit_trees
            .borrow()
            .get(&commit)
            .copied()
            .ok_or(VcsError::NotFound(commit))
    }

    /// A simplified merge: the feature tree's entries overlaid on the
    /// target tree's, with no conflict detection. Good enough to give
    /// mergeable-preview a distinct, deterministic tree id to check policy
    /// against; real conflict resolution is the host VCS's job.
    fn merge_tree(&self, a: Oid, b: Oid) -> Result<Oid, VcsError> {
        let tree_b = self.commit_tree_id(b)?;
        if a.is_zero() {
            return Ok(tree_b);
        }
        let tree_a = self.commit_tree_id(a)?;
        let merged = {
            let trees = self.trees.borrow();
            let mut entries = trees.get(&tree_a).cloned().unwrap_or_default();
            if let Some(from_b) = trees.get(&tree_b) {
                entries.extend(from_b.clone());
            }
            entries
        };
        Ok(self.add_tree(merged))
    }

    fn changed_paths(&self, commit: Oid) -> Result<Vec<String>, VcsError> {
        let trees = self.trees.borrow();
        let commit_trees = self.commit_trees.borrow();
        let tree = commit_trees.get(&commit).and_then(|t| trees.get(t));
        let parent_tree = self
            .commit_parents
            .borrow()
            .get(&commit)
            .and_then(|p| commit_trees.get(p))
            .and_then(|t| trees.get(t));

        let mut changed = Vec::new();
        if let Some(tree) = tree {
            for (path, blob) in tree {
                if parent_tree.and_then(|p| p.get(path)) != Some(blob) {
                    changed.push(path.clone());
                }
            }
        }
        Ok(changed)
    }

    fn commits_between(&self, old: Oid, new: Oid) -> Result<Vec<Oid>, VcsError> {
        let parents = self.commit_parents.borrow();
        let mut out = Vec::new();
        let mut cursor = new;
        loop {
            if cursor == old {
                break;
            }
            out.push(cursor);
            match parents.get(&cursor) {
                Some(parent) => cursor = *parent,
                None => break,
            }
        }
        out.reverse();
        Ok(out)
    }

    fn knows_commit(&self, descendant: Oid, ancestor: Oid) -> Result<bool, VcsError> {
        if ancestor.is_zero() {
            return Ok(true);
        }
        let parents = self.commit_parents.borrow();
        let mut cursor = descendant;
        loop {
            if cursor == ancestor {
                return Ok(true);
            }
            match parents.get(&cursor) {
                Some(parent) => cursor = *parent,
                None => return Ok(false),
            }
        }
    }

    fn tag_target(&self, tag: Oid) -> Result<Oid, VcsError> {
        Ok(tag)
    }

    fn get_reference(&self, name: &RefName) -> Result<Oid, VcsError> {
        self.refs
            .borrow()
            .get(name)
            .copied()
            .ok_or_else(|| VcsError::RefNotFound(name.clone()))
    }
}

impl CommitLog for MemVcs {
    fn parent_of(&self, id: Oid) -> Result<Option<Oid>, VcsError> {
        Ok(self.commit_parents.borrow().get(&id).copied())
    }

    fn message_of(&self, id: Oid) -> Result<String, VcsError> {
        Ok(self.commit_messages.borrow().get(&id).cloned().unwrap_or_default())
    }

    fn reference_tip(&self, name: &RefName) -> Result<Oid, VcsError> {
        self.get_reference(name)
    }
}

/// A principal backed by a single [`MockSigner`]'s Ed25519 key.
pub fn solo_principal(id: &str, signer: &MockSigner) -> Principal {
    let key = Key::ed25519(*signer.public_key());
    Principal::new(PrincipalId::from(id), vec![key])
}

pub fn key_id_of(signer: &MockSigner) -> KeyId {
    KeyId::from(signer.public_key())
}

pub fn human_key(signer: &MockSigner) -> String {
    signer.public_key().to_human()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::envelope::{Envelope, EnvelopeSignature};
    use crate::rsl::{GitJournal, Journal};
    use crate::search::LinearSearcher;
    use crate::vcs::refs;
    use crate::verify::{VerificationError, Workflow};

    use super::*;

    fn signed_envelope(payload: serde_json::Value, signer: &MockSigner) -> Envelope {
        let payload = serde_json::to_vec(&payload).expect("json payload serializes");
        let signature = signer.sign(&payload);
        Envelope {
            payload,
            signatures: vec![EnvelopeSignature {
                key_id: key_id_of(signer),
                signature: signature.as_ref().to_vec(),
            }],
        }
    }

    /// One root principal, one delegated rule protecting `refs/heads/main`
    /// with threshold 1, plus a terminal allow-rule for everything else.
    struct Fixture {
        vcs: MemVcs,
        alice: MockSigner,
        policy_commit: Oid,
    }

    fn build_fixture() -> Fixture {
        let vcs = MemVcs::new();
        let alice = MockSigner::from_index(1);
        let alice_key_doc = json!({
            "id": key_id_of(&alice).0,
            "type": "ed25519",
            "material": human_key(&alice),
        });
        let principals_doc = json!({
            "alice": { "keys": [alice_key_doc], "associated_identities": {} },
        });

        let root_payload = json!({
            "principals": principals_doc,
            "root_principal_ids": ["alice"],
            "root_threshold": 1,
            "primary_rule_file_principal_ids": ["alice"],
            "primary_rule_file_threshold": 1,
            "global_rules": [],
            "controllers": [],
            "network_repositories": [],
        });
        let root_env = signed_envelope(root_payload, &alice);

        let targets_payload = json!({
            "rules": [
                {
                    "name": "protect-main",
                    "patterns": ["git:refs/heads/main"],
                    "principal_ids": ["alice"],
                    "threshold": 1,
                },
                {
                    "name": "allow-rule",
                    "patterns": ["git:*"],
                    "principal_ids": [],
                    "threshold": 1,
                },
            ],
            "principals": principals_doc,
        });
        let targets_env = signed_envelope(targets_payload, &alice);

        let root_blob = vcs.add_blob(serde_json::to_vec(&root_env).unwrap());
        let targets_blob = vcs.add_blob(serde_json::to_vec(&targets_env).unwrap());
        let policy_tree = vcs.add_tree([
            ("metadata/root.json".to_owned(), root_blob),
            ("metadata/targets.json".to_owned(), targets_blob),
        ]);
        let policy_commit = vcs.add_commit(None, policy_tree, None);

        Fixture {
            vcs,
            alice,
            policy_commit,
        }
    }

    #[test]
    fn verifies_a_properly_signed_reference_update() {
        let fx = build_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        let main_commit = fx.vcs.add_commit(
            None,
            empty_tree,
            Some((&fx.alice, key_id_of(&fx.alice))),
        );

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        let e2 = fx.vcs.add_rsl_entry(
            Some(e1),
            format!(
                "rsl-entry: reference\nnumber: 2\nref: {}\ntarget: {}\n",
                main, main_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e2);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let verified = workflow
            .verify_ref_full(&main)
            .expect("a properly signed update verifies");
        assert_eq!(verified, main_commit);
    }

    #[test]
    fn rejects_an_unsigned_reference_update() {
        let fx = build_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        // No signer: `protect-main` requires one credited principal.
        let main_commit = fx.vcs.add_commit(None, empty_tree, None);

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        let e2 = fx.vcs.add_rsl_entry(
            Some(e1),
            format!(
                "rsl-entry: reference\nnumber: 2\nref: {}\ntarget: {}\n",
                main, main_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e2);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let err = workflow
            .verify_ref_full(&main)
            .expect_err("an unsigned update must not verify");
        assert!(matches!(err, VerificationError::VerifierConditionsUnmet(_)));
    }

    #[test]
    fn recovers_past_a_skip_annotated_entry() {
        let fx = build_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        let good_commit = fx
            .vcs
            .add_commit(None, empty_tree, Some((&fx.alice, key_id_of(&fx.alice))));
        // A bad update with no signature, later revoked by an annotation,
        // followed by a fix entry that reproduces the last-good tree.
        let bad_commit = fx.vcs.add_commit(None, empty_tree, None);

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        let e2 = fx.vcs.add_rsl_entry(
            Some(e1),
            format!(
                "rsl-entry: reference\nnumber: 2\nref: {}\ntarget: {}\n",
                main, good_commit
            ),
        );
        let e3 = fx.vcs.add_rsl_entry(
            Some(e2),
            format!(
                "rsl-entry: reference\nnumber: 3\nref: {}\ntarget: {}\n",
                main, bad_commit
            ),
        );
        let e4 = fx.vcs.add_rsl_entry(
            Some(e3),
            format!("rsl-entry: annotation\nnumber: 4\ntargets: {e3}\nskip: true\n"),
        );
        let e5 = fx.vcs.add_rsl_entry(
            Some(e4),
            format!(
                "rsl-entry: reference\nnumber: 5\nref: {}\ntarget: {}\n",
                main, good_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e5);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let verified = workflow
            .verify_ref_full(&main)
            .expect("recovery should accept the fix entry");
        assert_eq!(verified, good_commit);
    }

    /// Two principals, `protect-main` at threshold 2.
    struct TwoSignerFixture {
        vcs: MemVcs,
        alice: MockSigner,
        bob: MockSigner,
        policy_commit: Oid,
    }

    fn build_two_signer_fixture() -> TwoSignerFixture {
        let vcs = MemVcs::new();
        let alice = MockSigner::from_index(1);
        let bob = MockSigner::from_index(2);
        let principals_doc = json!({
            "alice": {
                "keys": [{ "id": key_id_of(&alice).0, "type": "ed25519", "material": human_key(&alice) }],
                "associated_identities": {},
            },
            "bob": {
                "keys": [{ "id": key_id_of(&bob).0, "type": "ed25519", "material": human_key(&bob) }],
                "associated_identities": {},
            },
        });

        let root_payload = json!({
            "principals": principals_doc,
            "root_principal_ids": ["alice"],
            "root_threshold": 1,
            "primary_rule_file_principal_ids": ["alice"],
            "primary_rule_file_threshold": 1,
            "global_rules": [],
            "controllers": [],
            "network_repositories": [],
        });
        let root_env = signed_envelope(root_payload, &alice);

        let targets_payload = json!({
            "rules": [
                {
                    "name": "protect-main",
                    "patterns": ["git:refs/heads/main"],
                    "principal_ids": ["alice", "bob"],
                    "threshold": 2,
                },
                {
                    "name": "allow-rule",
                    "patterns": ["git:*"],
                    "principal_ids": [],
                    "threshold": 1,
                },
            ],
            "principals": principals_doc,
        });
        let targets_env = signed_envelope(targets_payload, &alice);

        let root_blob = vcs.add_blob(serde_json::to_vec(&root_env).unwrap());
        let targets_blob = vcs.add_blob(serde_json::to_vec(&targets_env).unwrap());
        let policy_tree = vcs.add_tree([
            ("metadata/root.json".to_owned(), root_blob),
            ("metadata/targets.json".to_owned(), targets_blob),
        ]);
        let policy_commit = vcs.add_commit(None, policy_tree, None);

        TwoSignerFixture {
            vcs,
            alice,
            bob,
            policy_commit,
        }
    }

    #[test]
    fn approval_envelope_tops_up_a_missing_signature_to_meet_threshold() {
        let fx = build_two_signer_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        let main_commit = fx.vcs.add_commit(
            None,
            empty_tree,
            Some((&fx.alice, key_id_of(&fx.alice))),
        );

        // Bob never signs the commit; his authorization is recorded
        // out-of-band as a reference-authorization envelope instead.
        let auth_env = signed_envelope(json!({"approved": true}), &fx.bob);
        let auth_blob = fx.vcs.add_blob(serde_json::to_vec(&auth_env).unwrap());
        let attestations_tree = fx.vcs.add_tree([(
            format!("authorizations/{main}/{}-{}.json", Oid::ZERO, empty_tree),
            auth_blob,
        )]);
        let attestations_commit = fx.vcs.add_commit(None, attestations_tree, None);

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        let e2 = fx.vcs.add_rsl_entry(
            Some(e1),
            format!(
                "rsl-entry: reference\nnumber: 2\nref: {}\ntarget: {}\n",
                refs::ATTESTATIONS,
                attestations_commit
            ),
        );
        let e3 = fx.vcs.add_rsl_entry(
            Some(e2),
            format!(
                "rsl-entry: reference\nnumber: 3\nref: {}\ntarget: {}\n",
                main, main_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e3);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let verified = workflow
            .verify_ref_full(&main)
            .expect("alice's signature plus bob's authorization meets threshold 2");
        assert_eq!(verified, main_commit);
    }

    /// Same shape as [`build_fixture`], plus a global rule blocking
    /// force-pushes to `refs/heads/main`.
    fn build_force_push_block_fixture() -> Fixture {
        let vcs = MemVcs::new();
        let alice = MockSigner::from_index(1);
        let principals_doc = json!({
            "alice": {
                "keys": [{ "id": key_id_of(&alice).0, "type": "ed25519", "material": human_key(&alice) }],
                "associated_identities": {},
            },
        });

        let root_payload = json!({
            "principals": principals_doc,
            "root_principal_ids": ["alice"],
            "root_threshold": 1,
            "primary_rule_file_principal_ids": ["alice"],
            "primary_rule_file_threshold": 1,
            "global_rules": [
                { "type": "block-force-pushes", "pattern": "git:refs/heads/main" },
            ],
            "controllers": [],
            "network_repositories": [],
        });
        let root_env = signed_envelope(root_payload, &alice);

        let targets_payload = json!({
            "rules": [
                {
                    "name": "protect-main",
                    "patterns": ["git:refs/heads/main"],
                    "principal_ids": ["alice"],
                    "threshold": 1,
                },
                {
                    "name": "allow-rule",
                    "patterns": ["git:*"],
                    "principal_ids": [],
                    "threshold": 1,
                },
            ],
            "principals": principals_doc,
        });
        let targets_env = signed_envelope(targets_payload, &alice);

        let root_blob = vcs.add_blob(serde_json::to_vec(&root_env).unwrap());
        let targets_blob = vcs.add_blob(serde_json::to_vec(&targets_env).unwrap());
        let policy_tree = vcs.add_tree([
            ("metadata/root.json".to_owned(), root_blob),
            ("metadata/targets.json".to_owned(), targets_blob),
        ]);
        let policy_commit = vcs.add_commit(None, policy_tree, None);

        Fixture {
            vcs,
            alice,
            policy_commit,
        }
    }

    #[test]
    fn global_block_force_pushes_rejects_a_non_descendant_update() {
        let fx = build_force_push_block_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        let c1 = fx.vcs.add_commit(None, empty_tree, Some((&fx.alice, key_id_of(&fx.alice))));
        // A second signed commit, unrelated to c1's history.
        let c8 = fx.vcs.add_commit(None, empty_tree, Some((&fx.alice, key_id_of(&fx.alice))));

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        let e2 = fx.vcs.add_rsl_entry(
            Some(e1),
            format!("rsl-entry: reference\nnumber: 2\nref: {}\ntarget: {}\n", main, c1),
        );
        let e3 = fx.vcs.add_rsl_entry(
            Some(e2),
            format!("rsl-entry: reference\nnumber: 3\nref: {}\ntarget: {}\n", main, c8),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e3);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let err = workflow
            .verify_ref_full(&main)
            .expect_err("a non-fast-forward update must be rejected");
        assert!(matches!(err, VerificationError::InvalidRslEntry(_)));
    }

    #[test]
    fn mergeable_preview_reports_whether_an_rsl_signature_is_still_needed() {
        let fx = build_fixture();
        let main = RefName::new("refs/heads/main");

        let empty_tree = fx.vcs.add_tree(std::iter::empty());
        let feature_commit = fx.vcs.add_commit(None, empty_tree, None);

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e1);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let needs_rsl_sig = workflow
            .verify_mergeable(&main, Oid::ZERO, feature_commit)
            .expect("a preview one credit short of threshold succeeds");
        assert!(needs_rsl_sig);
    }

    #[test]
    fn mergeable_preview_rejects_tag_refs() {
        let fx = build_fixture();
        let tag_ref = RefName::new("refs/tags/v1");

        let e1 = fx.vcs.add_rsl_entry(
            None,
            format!(
                "rsl-entry: reference\nnumber: 1\nref: {}\ntarget: {}\n",
                refs::POLICY,
                fx.policy_commit
            ),
        );
        fx.vcs.set_ref(RefName::new(refs::RSL), e1);

        let journal = GitJournal::new(&fx.vcs, RefName::new(refs::RSL));
        let searcher = LinearSearcher::new(&journal);
        let workflow = Workflow::new(
            &fx.vcs,
            &journal,
            &searcher,
            vec![solo_principal("alice", &fx.alice)],
            1,
        );

        let err = workflow
            .verify_mergeable(&tag_ref, Oid::ZERO, Oid::ZERO)
            .expect_err("tag refs cannot be merge-previewed");
        assert!(matches!(err, VerificationError::CannotVerifyMergeableForTagRef));
    }
}
