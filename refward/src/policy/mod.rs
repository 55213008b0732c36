//! Policy state: the resolved set of rules and principals in force at a
//! given point in the log (see DATA MODEL / PolicyState, §4.3).

pub mod controller;
pub mod root;
pub mod rule;
pub mod rulefile;
pub mod state;

pub use root::{ApprovalApp, ControllerLink, GlobalRule, RootMetadata, TaggedGlobalRule};
pub use rule::{Pattern, Rule};
pub use rulefile::RuleFile;
pub use state::PolicyState;

use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::vcs::VcsError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no policy at or before this entry")]
    PolicyNotFound,
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("invalid root metadata: {0}")]
    InvalidRootMetadata(String),
    #[error("controller metadata for '{0}' could not be verified")]
    ControllerMetadataNotVerified(String),
    #[error("verifier conditions unmet: {0}")]
    VerifierConditionsUnmet(#[from] refward_crypto::threshold::VerifierError),
    #[error("missing metadata blob at '{0}'")]
    MissingBlob(&'static str),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
}
