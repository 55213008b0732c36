//! The threshold verification engine.
//!
//! A [`Verifier`] names a set of principals and a minimum count of them
//! ("threshold") that must credit an entry before it is accepted. Credit can
//! come from the VCS object's own native signature (e.g. a signed git
//! commit/tag) and/or from a signed envelope (e.g. a reference-authorization
//! attestation); a single key can never credit more than one principal in a
//! single verification call.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::key::{Key, KeyId};
use crate::principal::{Principal, PrincipalId};

/// Source of a VCS object's own signature (e.g. a signed git commit/tag).
/// The core never inspects the signature format itself; it only asks each
/// candidate key whether it produced the object's signature.
pub trait ObjectSignatureSource {
    fn verify_with(&self, key: &Key) -> bool;
}

/// Source of a signed envelope's accepted keys (e.g. a reference
/// authorization or approval-app attestation). Returns the subset of
/// `candidates` whose signature over the envelope validates.
pub trait EnvelopeSource {
    fn accepted_keys<'a>(&self, candidates: &[&'a Key]) -> Vec<&'a Key>;
}

/// The set of principal ids credited by one verification call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreditedPrincipals(BTreeSet<PrincipalId>);

impl CreditedPrincipals {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &PrincipalId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrincipalId> {
        self.0.iter()
    }

    pub fn merge(&mut self, other: &CreditedPrincipals) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn insert(&mut self, id: PrincipalId) {
        self.0.insert(id);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifierError {
    #[error("verifier '{0}' conditions unmet: got {1} of {2} required credits")]
    ConditionsUnmet(String, usize, usize),
}

/// A named delegation of authority over some set of principals, with a
/// signing threshold.
#[derive(Debug, Clone)]
pub struct Verifier {
    pub name: String,
    pub principals: Vec<Principal>,
    pub threshold: usize,
    /// When true, credit accumulation does not short-circuit once the
    /// threshold is met; every credited principal is still reported. Used
    /// by merge-preview, which needs `threshold - 1` accounting.
    pub verify_exhaustively: bool,
}

impl Verifier {
    pub fn new(name: impl Into<String>, principals: Vec<Principal>, threshold: usize) -> Self {
        Self {
            name: name.into(),
            principals,
            threshold,
            verify_exhaustively: false,
        }
    }

    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.verify_exhaustively = exhaustive;
        self
    }

    /// Run the threshold check described in the design: credit principals
    /// from the object's own signature first, then top up from the
    /// envelope, tracking consumed keys so no key credits twice.
    pub fn verify(
        &self,
        object: Option<&dyn ObjectSignatureSource>,
        envelope: Option<&dyn EnvelopeSource>,
    ) -> Result<CreditedPrincipals, VerifierError> {
        let credited = self.accumulate_credits(object, envelope);

        if credited.len() >= self.threshold {
            Ok(credited)
        } else {
            Err(VerifierError::ConditionsUnmet(
                self.name.clone(),
                credited.len(),
                self.threshold,
            ))
        }
    }

    /// Like [`Verifier::verify`] but never fails; used when the caller only
    /// wants a credit count (e.g. global-rule re-checks, merge preview).
    pub fn accumulate_credits(
        &self,
        object: Option<&dyn ObjectSignatureSource>,
        envelope: Option<&dyn EnvelopeSource>,
    ) -> CreditedPrincipals {
        let mut credited = CreditedPrincipals::default();
        let mut used_keys: BTreeSet<KeyId> = BTreeSet::new();

        if let Some(object) = object {
            'principals: for principal in &self.principals {
                for key in &principal.keys {
                    if used_keys.contains(&key.id) {
                        continue;
                    }
                    if object.verify_with(key) {
                        credited.insert(principal.id.clone());
                        used_keys.insert(key.id.clone());
                        continue 'principals;
                    }
                }
            }
        }

        let satisfied_by_object_alone =
            self.threshold == 1 && !credited.is_empty() && !self.verify_exhaustively;

        if satisfied_by_object_alone {
            return credited;
        }

        if let Some(envelope) = envelope {
            for principal in &self.principals {
                if credited.contains(&principal.id) {
                    continue;
                }
                let candidates: Vec<&Key> = principal
                    .keys
                    .iter()
                    .filter(|k| !used_keys.contains(&k.id))
                    .collect();
                if candidates.is_empty() {
                    continue;
                }
                let accepted = envelope.accepted_keys(&candidates);
                if let Some(key) = accepted
                    .into_iter()
                    .find(|k| principal.keys.iter().any(|pk| pk.id == k.id))
                {
                    credited.insert(principal.id.clone());
                    used_keys.insert(key.id.clone());
                }
            }
        }

        credited
    }

    /// Credit principals whose `associatedIdentities[issuer]` names one of
    /// `approvers`. Used to top up credits from a third-party approval-app
    /// attestation.
    pub fn credit_associated_identities(
        &self,
        issuer: &str,
        approvers: &[String],
    ) -> CreditedPrincipals {
        let mut credited = CreditedPrincipals::default();
        for principal in &self.principals {
            if let Some(identity) = principal.associated_identity(issuer) {
                if approvers.iter().any(|a| a == identity) {
                    credited.insert(principal.id.clone());
                }
            }
        }
        credited
    }
}
