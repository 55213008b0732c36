//! The attestation-store seam (see § EXTERNAL INTERFACES).
//!
//! A host may keep attestations outside the repository's own tree (e.g. a
//! code-review server's database); this trait lets the verification
//! workflow consume them uniformly whether they came from
//! [`crate::attestation::AttestationsState::load`] or from such a store.

use crate::attestation::AttestationKey;
use crate::envelope::Envelope;

pub trait AttestationStore {
    /// The reference-authorization envelope for this exact transition, if
    /// one has been recorded.
    fn get_reference_authorization_for(&self, key: &AttestationKey) -> Option<&Envelope>;

    /// The registered approval app's attestation for this transition, plus
    /// the approver identities (as known to that app) it enumerates.
    fn get_pull_request_approval_attestation_for(
        &self,
        app_name: &str,
        key: &AttestationKey,
    ) -> Option<(&Envelope, &[String])>;
}
