//! A repository-integrity policy layer over a content-addressed VCS.
//!
//! This crate answers one question for every update to a named reference:
//! was the update authorized by the policy in force when it was made, and
//! is the chain of updates to that reference internally consistent? The
//! answer is derived from the Reference State Log (see [`rsl`]), policy
//! state resolved from it (see [`policy`]), and a verification workflow
//! that walks the two together (see [`verify`]).
//!
//! The crate performs no network I/O and does not manage credentials; it
//! treats the VCS (see [`vcs`]) and any attestation store (see
//! [`attestation`]) as read-only collaborators supplied by the host
//! application.

pub mod attestation;
pub mod config;
pub mod envelope;
pub mod error;
pub mod policy;
pub mod rsl;
pub mod search;
pub mod vcs;
pub mod verify;

#[cfg(any(test, feature = "test"))]
pub mod test;

pub use config::PolicyRuntimeConfig;
pub use error::Error;
pub use refward_crypto as crypto;

pub mod prelude {
    pub use crate::attestation::{AttestationKey, AttestationStore, AttestationsState};
    pub use crate::error::Error;
    pub use crate::policy::{GlobalRule, PolicyState, RootMetadata, Rule, RuleFile};
    pub use crate::rsl::{Entry, EntryId};
    pub use crate::search::Searcher;
    pub use crate::vcs::{ReadVcs, RefName};
    pub use crate::verify::{VerificationError, Workflow};
}
