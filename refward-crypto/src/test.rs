//! Deterministic test fixtures.
//!
//! Signers here are always seeded explicitly (never from OS randomness), so
//! that tests built on top of them are reproducible byte-for-byte.

use crate::{KeyPair, PublicKey, SecretKey, Seed, Signature, Signer, SignerError};

#[derive(Debug, Clone)]
pub struct MockSigner {
    pk: PublicKey,
    sk: SecretKey,
}

impl MockSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let keypair = KeyPair::from_seed(Seed::new(seed));
        Self::from(SecretKey::from(keypair.sk))
    }

    /// A signer seeded from a single repeated byte, for readable test setup
    /// (`MockSigner::from_index(1)`, `MockSigner::from_index(2)`, ...).
    pub fn from_index(index: u8) -> Self {
        Self::from_seed([index; 32])
    }
}

impl From<SecretKey> for MockSigner {
    fn from(sk: SecretKey) -> Self {
        let pk = sk.public_key().into();
        Self { sk, pk }
    }
}

impl PartialEq for MockSigner {
    fn eq(&self, other: &Self) -> bool {
        self.pk == other.pk
    }
}

impl Eq for MockSigner {}

impl Signer for MockSigner {
    fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    fn sign(&self, msg: &[u8]) -> Signature {
        self.sk.sign(msg, None).into()
    }

    fn try_sign(&self, msg: &[u8]) -> Result<Signature, SignerError> {
        Ok(self.sign(msg))
    }
}
