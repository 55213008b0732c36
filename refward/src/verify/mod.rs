//! The verification workflow: walking the RSL against policy state (§4.5).

pub mod mergeable;
pub mod tag;
pub mod workflow;

pub use workflow::Workflow;

use thiserror::Error;

use refward_crypto::threshold::VerifierError;

use crate::attestation::AttestationError;
use crate::policy::PolicyError;
use crate::rsl::RslError;
use crate::vcs::{Oid, RefName, VcsError};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    VerifierConditionsUnmet(#[from] VerifierError),
    #[error("entry at {0} is invalid and was not skipped by an annotation")]
    InvalidEntryNotSkipped(Oid),
    #[error("last good entry for '{0}' before a recovery point is itself skipped")]
    LastGoodEntryIsSkipped(RefName),
    #[error("no policy in force for '{0}'")]
    PolicyNotFound(RefName),
    #[error("mergeable verification is not supported for tag references")]
    CannotVerifyMergeableForTagRef,
    #[error("invalid rsl entry: {0}")]
    InvalidRslEntry(String),
    #[error("rsl error: {0}")]
    Rsl(#[from] RslError),
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
    #[error("attestation error: {0}")]
    Attestation(#[from] AttestationError),
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
}

/// Wraps a [`VerificationError`] for user presentation, naming the entry
/// and reference the failure occurred at.
#[derive(Debug, Error)]
#[error("verification of '{ref_name}' failed at entry {entry}: {source}")]
pub struct VerificationFailed {
    pub ref_name: RefName,
    pub entry: Oid,
    #[source]
    pub source: VerificationError,
}
