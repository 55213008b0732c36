//! The read-only VCS contract the policy engine consumes.
//!
//! The engine never mutates the VCS and never performs network I/O; every
//! method here is a synchronous, read-only call the host's transport layer
//! is responsible for satisfying against its local object store. `git` is
//! the concrete instance this crate ships (see [`git`]), mirroring the way
//! the teacher repo exposes a `ReadRepository` trait with a `storage::git`
//! backend behind it.

use std::fmt;
use std::str::FromStr;

use refward_crypto::Key;
use thiserror::Error;

pub mod git;

pub use git::GitVcs;

/// An opaque, fixed-width VCS object id.
///
/// Internally this is whatever byte width the backing VCS uses (20 bytes
/// for SHA-1 git, 32 for SHA-256 git); the policy engine only relies on
/// `Eq`, a zero value denoting "no object", and a stable string form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid {
    bytes: [u8; 32],
    len: u8,
}

impl Oid {
    pub const ZERO: Oid = Oid {
        bytes: [0; 32],
        len: 20,
    };

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0; 32];
        let len = bytes.len().min(32);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            bytes: buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }
}

impl Default for Oid {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("invalid object id '{0}'")]
pub struct OidParseError(String);

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|b| u8::from_str_radix(b, 16).ok())
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| OidParseError(s.to_owned()))?;

        if bytes.len() != 20 && bytes.len() != 32 {
            return Err(OidParseError(s.to_owned()));
        }
        Ok(Self::from_bytes(&bytes))
    }
}

/// A path-like reference name, e.g. `refs/heads/main`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

impl RefName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RefName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RefName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Well-known reference prefixes the verification workflow distinguishes.
pub mod refs {
    /// Where the RSL itself lives.
    pub const RSL: &str = "refs/refward/reference-state-log";
    /// The current policy.
    pub const POLICY: &str = "refs/refward/policy";
    /// A policy staged for review but not yet authoritative.
    pub const POLICY_STAGING: &str = "refs/refward/policy-staging";
    /// Reference/approval attestations.
    pub const ATTESTATIONS: &str = "refs/refward/attestations";
    /// Tag namespace prefix.
    pub const TAGS: &str = "refs/tags/";

    pub fn is_policy(name: &str) -> bool {
        name == POLICY
    }

    pub fn is_policy_staging(name: &str) -> bool {
        name == POLICY_STAGING
    }

    pub fn is_attestations(name: &str) -> bool {
        name == ATTESTATIONS
    }

    pub fn is_tag(name: &str) -> bool {
        name.starts_with(TAGS)
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("object not found: {0}")]
    NotFound(Oid),
    #[error("reference not found: {0}")]
    RefNotFound(RefName),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// The read-only VCS handle the engine is built against.
///
/// Every method is a synchronous call that may fail with [`VcsError`]; the
/// engine never retries and never falls back silently.
pub trait ReadVcs {
    /// Raw bytes of an arbitrary object (used to load metadata blobs).
    fn read_object(&self, id: Oid) -> Result<Vec<u8>, VcsError>;

    /// Resolve a slash-separated path within a tree to the blob it names,
    /// e.g. `metadata/root.json`. `None` if no such path exists.
    fn resolve_path(&self, tree: Oid, path: &str) -> Result<Option<Oid>, VcsError>;

    /// List every blob's path under `prefix` within a tree, recursively.
    /// `None` (empty) if `prefix` does not exist.
    fn list_tree(&self, tree: Oid, prefix: &str) -> Result<Vec<String>, VcsError>;

    /// Verify the VCS-native signature on `id` (e.g. a signed git
    /// commit/tag) against `key`, without knowing the signature's format.
    fn verify_signature(&self, id: Oid, key: &Key) -> bool;

    /// The tree id a commit records.
    fn commit_tree_id(&self, commit: Oid) -> Result<Oid, VcsError>;

    /// The tree id of the hypothetical (not yet created) merge of `a` into
    /// `b`.
    fn merge_tree(&self, a: Oid, b: Oid) -> Result<Oid, VcsError>;

    /// Paths a commit modifies relative to its first parent, in the order
    /// the VCS reports them.
    fn changed_paths(&self, commit: Oid) -> Result<Vec<String>, VcsError>;

    /// Commits reachable from `new` but not from `old`, oldest first.
    fn commits_between(&self, old: Oid, new: Oid) -> Result<Vec<Oid>, VcsError>;

    /// Whether `descendant` has `ancestor` in its history (a fast-forward
    /// check).
    fn knows_commit(&self, descendant: Oid, ancestor: Oid) -> Result<bool, VcsError>;

    /// The commit a (possibly annotated) tag object points at.
    fn tag_target(&self, tag: Oid) -> Result<Oid, VcsError>;

    /// The current target of a reference.
    fn get_reference(&self, name: &RefName) -> Result<Oid, VcsError>;
}

/// Narrow, git-shaped access to the RSL's own commit chain: the first
/// parent and raw message of a commit. Kept separate from [`ReadVcs`]
/// because nothing else in the engine needs to read a commit message —
/// only [`crate::rsl::GitJournal`] decodes the structured record a commit
/// on the RSL ref carries.
pub trait CommitLog {
    /// The commit's first parent, or `None` if it is the RSL's origin
    /// commit.
    fn parent_of(&self, id: Oid) -> Result<Option<Oid>, VcsError>;
    /// The commit's raw message.
    fn message_of(&self, id: Oid) -> Result<String, VcsError>;
    /// The commit a reference currently points at.
    fn reference_tip(&self, name: &RefName) -> Result<Oid, VcsError>;
}
