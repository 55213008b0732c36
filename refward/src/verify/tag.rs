//! Tag-namespace entries: verified like any other Git-namespace update (the
//! declared threshold, with envelope top-up), plus an additional check that
//! the tag object itself carries at least one native signature from a
//! matching principal. A tag is a single signed object, not a sequence of
//! commits a threshold can accumulate credit across, so an envelope alone
//! can never stand in for the object's own signature the way it can for an
//! ordinary reference update.

use refward_crypto::key::Key;
use refward_crypto::threshold::{CreditedPrincipals, ObjectSignatureSource, Verifier, VerifierError};

use crate::attestation::{AttestationKey, AttestationsState};
use crate::policy::PolicyState;
use crate::rsl::ReferenceEntry;
use crate::vcs::{Oid, ReadVcs};
use crate::verify::workflow::Workflow;
use crate::verify::VerificationError;

impl<V: ReadVcs, J: crate::rsl::Journal, S: crate::search::Searcher> Workflow<'_, V, J, S> {
    /// Verify a tag-namespace entry. Returns the commit the tag resolves to
    /// (via [`ReadVcs::tag_target`]) and the principals credited under the
    /// matching rule's normal threshold, for the caller to fold into the
    /// usual global-rule checks.
    pub(super) fn verify_tag(
        &self,
        policy: &PolicyState,
        attestations: Option<&AttestationsState>,
        entry: &ReferenceEntry,
        from_id: Oid,
    ) -> Result<(Oid, CreditedPrincipals), VerificationError> {
        let tag_commit = self.vcs.tag_target(entry.target_id)?;

        let key = AttestationKey::new(entry.ref_name.clone(), from_id, tag_commit);
        let authorization = attestations.and_then(|a| a.get_reference_authorization_for(&key));
        let app = policy.approval_app.as_ref().and_then(|app| {
            attestations
                .and_then(|a| a.get_pull_request_approval_attestation_for(&app.name, &key))
                .map(|(_, approvers)| (app.name.as_str(), approvers))
        });

        let verifiers = self.exhaustive_verifiers(policy.verifiers_for_ref(&entry.ref_name));
        let (_, credited, _) =
            self.verify_namespace(&verifiers, entry.target_id, authorization, app, None, false)?;

        let object = TagObject {
            vcs: self.vcs,
            id: entry.target_id,
        };
        let has_native_signature = verifiers.iter().any(|v| {
            !Verifier::new(v.name.clone(), v.principals.clone(), 1)
                .accumulate_credits(Some(&object as &dyn ObjectSignatureSource), None)
                .is_empty()
        });
        if !has_native_signature {
            return Err(VerificationError::VerifierConditionsUnmet(
                VerifierError::ConditionsUnmet("tag-native-signature".into(), 0, 1),
            ));
        }

        Ok((tag_commit, credited))
    }
}

struct TagObject<'v, V> {
    vcs: &'v V,
    id: Oid,
}

impl<'v, V: ReadVcs> ObjectSignatureSource for TagObject<'v, V> {
    fn verify_with(&self, key: &Key) -> bool {
        self.vcs.verify_signature(self.id, key)
    }
}
