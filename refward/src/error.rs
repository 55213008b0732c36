//! The crate-wide error taxonomy (see design doc §7, ERROR HANDLING DESIGN).
//!
//! Each layer (`rsl`, `policy`, `search`, `verify`) owns a focused
//! `thiserror` enum; this module composes them into one type via `#[from]`
//! so callers that don't care which layer failed can match on [`Error`]
//! alone, while callers that do can still match the inner variant.

use thiserror::Error;

use crate::policy::PolicyError;
use crate::rsl::RslError;
use crate::verify::VerificationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rsl(#[from] RslError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("vcs error: {0}")]
    Vcs(#[from] crate::vcs::VcsError),
}
