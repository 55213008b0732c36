//! Verification keys.
//!
//! A [`Key`] pairs a stable [`KeyId`] with a [`KeyType`]. The Ed25519
//! variant is verified natively by this crate; every other variant carries
//! opaque key material plus a caller-supplied [`RawVerifier`], since this
//! crate specifies only the contract those backends must satisfy (RSA,
//! ECDSA, OpenPGP, SSH-format, Sigstore/Rekor) and does not implement them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PublicKey, Signature};

/// A stable, opaque key identifier (e.g. an SSH fingerprint, a PGP long id,
/// or the Ed25519 public key's human-readable encoding).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(pub String);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&PublicKey> for KeyId {
    fn from(pk: &PublicKey) -> Self {
        Self(pk.to_human())
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A key's cryptographic family.
///
/// Closed by design: the verifier dispatches on this discriminant rather
/// than via dynamic trait dispatch on the whole key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Natively verified by this crate.
    Ed25519(PublicKey),
    /// Verified by a caller-supplied [`RawVerifier`].
    Rsa(Vec<u8>),
    Ecdsa(Vec<u8>),
    Ssh(Vec<u8>),
    Gpg(Vec<u8>),
    Sigstore(Vec<u8>),
}

impl KeyType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "ed25519",
            Self::Rsa(_) => "rsa",
            Self::Ecdsa(_) => "ecdsa",
            Self::Ssh(_) => "ssh",
            Self::Gpg(_) => "gpg",
            Self::Sigstore(_) => "sigstore",
        }
    }
}

#[derive(Debug, Error)]
pub enum KeyVerifyError {
    #[error("signature does not verify under this key")]
    Invalid,
    #[error("key type '{0}' has no registered raw verifier")]
    NoBackend(&'static str),
}

/// A verifier for a non-native key type.
///
/// The host application implements this against whatever crypto library it
/// already trusts (an OpenPGP implementation, an SSH certificate verifier,
/// a Sigstore/Rekor client, ...) and registers it with a [`Key`]. This
/// crate never inspects the key material itself.
pub trait RawVerifier: Send + Sync {
    fn verify_raw(&self, key_material: &[u8], msg: &[u8], signature: &[u8]) -> bool;
}

/// A verification key: a stable id, a key type, and (for non-native types)
/// a pluggable backend.
#[derive(Clone)]
pub struct Key {
    pub id: KeyId,
    pub key_type: KeyType,
    backend: Option<Arc<dyn RawVerifier>>,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("key_type", &self.key_type.label())
            .finish()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.key_type == other.key_type
    }
}

impl Eq for Key {}

impl Key {
    pub fn ed25519(pk: PublicKey) -> Self {
        Self {
            id: KeyId::from(&pk),
            key_type: KeyType::Ed25519(pk),
            backend: None,
        }
    }

    pub fn with_backend(id: KeyId, key_type: KeyType, backend: Arc<dyn RawVerifier>) -> Self {
        Self {
            id,
            key_type,
            backend: Some(backend),
        }
    }

    /// Construct a non-native key with no backend registered yet. Verifying
    /// against it fails with [`KeyVerifyError::NoBackend`] until the host
    /// plugs one in, e.g. via [`Key::with_registered_backend`].
    pub fn unverified(id: KeyId, key_type: KeyType) -> Self {
        Self {
            id,
            key_type,
            backend: None,
        }
    }

    /// Return a copy of this key with `backend` registered, for non-native
    /// key types deserialized from metadata before the host has attached a
    /// verifier.
    pub fn with_registered_backend(mut self, backend: Arc<dyn RawVerifier>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Verify a raw signature bytes blob over `msg`.
    ///
    /// For the Ed25519 case, `signature` must be the 64-byte raw signature
    /// encoding understood by [`Signature::try_from`]. Every other key type
    /// delegates to the registered [`RawVerifier`].
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), KeyVerifyError> {
        match &self.key_type {
            KeyType::Ed25519(pk) => {
                let sig = Signature::try_from(signature).map_err(|_| KeyVerifyError::Invalid)?;
                pk.verify(msg, &sig).map_err(|_| KeyVerifyError::Invalid)
            }
            KeyType::Rsa(material)
            | KeyType::Ecdsa(material)
            | KeyType::Ssh(material)
            | KeyType::Gpg(material)
            | KeyType::Sigstore(material) => match &self.backend {
                Some(backend) if backend.verify_raw(material, msg, signature) => Ok(()),
                Some(_) => Err(KeyVerifyError::Invalid),
                None => Err(KeyVerifyError::NoBackend(self.key_type.label())),
            },
        }
    }
}
