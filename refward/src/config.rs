//! Runtime configuration for the policy engine.
//!
//! This is deliberately thin: the engine does no file or network I/O of its
//! own (see PURPOSE & SCOPE), so there is no config *format* to parse here.
//! The host application sources these values however it likes (CLI flags,
//! a config file, environment) and constructs this directly.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime knobs that affect verification behavior or performance, but
/// never its correctness contract.
#[derive(Debug, Clone)]
pub struct PolicyRuntimeConfig {
    /// Whether to consult (and maintain) the persistent policy/attestation
    /// cache. Advisory: disabling it only costs speed.
    pub cache_enabled: bool,
    /// Where the cache is stored, when enabled.
    pub cache_path: Option<PathBuf>,
    /// Default for `Verifier::verify_exhaustively` when a caller doesn't
    /// specify one explicitly.
    pub verify_exhaustively_default: bool,
    /// Clock-skew tolerance applied when comparing attestation timestamps
    /// against the current time, if the host application supplies one.
    pub clock_skew_tolerance: Duration,
}

impl Default for PolicyRuntimeConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_path: None,
            verify_exhaustively_default: false,
            clock_skew_tolerance: Duration::from_secs(300),
        }
    }
}

impl PolicyRuntimeConfig {
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self.cache_enabled = true;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self.cache_path = None;
        self
    }
}
