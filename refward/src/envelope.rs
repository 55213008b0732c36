//! Signed metadata/attestation envelopes.
//!
//! An envelope is a payload blob plus zero or more detached signatures, one
//! per signing key. This crate never constructs envelopes; it only parses
//! and verifies ones materialized from the VCS object store or handed in by
//! an [`crate::attestation::store::AttestationStore`].

use refward_crypto::key::{Key, KeyId};
use refward_crypto::threshold::EnvelopeSource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSignature {
    pub key_id: KeyId,
    /// Raw signature bytes; interpretation is delegated to [`Key::verify`].
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub signatures: Vec<EnvelopeSignature>,
}

impl Envelope {
    pub fn from_json(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

impl EnvelopeSource for Envelope {
    fn accepted_keys<'a>(&self, candidates: &[&'a Key]) -> Vec<&'a Key> {
        candidates
            .iter()
            .copied()
            .filter(|key| {
                self.signatures
                    .iter()
                    .any(|sig| sig.key_id == key.id && key.verify(&self.payload, &sig.signature).is_ok())
            })
            .collect()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
