//! The signer seam.
//!
//! Signature generation is a blocking operation; the host dispatches it to
//! whatever worker pool or key service it runs, and the relay awaits the
//! result. [`LocalSigner`] is the in-process implementation over a held key
//! pair.

use async_trait::async_trait;

use trellis_crypto::{sign as crypto_sign, KeyPair, PublicKey, Scheme};

use crate::error::{RelayError, Result};

/// Something that can sign on behalf of a public key.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The key signatures will verify against.
    fn public_key(&self) -> &PublicKey;

    /// The scheme signatures are produced under.
    fn scheme(&self) -> Scheme;

    /// Sign a message.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// In-process signer over a held key pair.
pub struct LocalSigner {
    key_pair: KeyPair,
}

impl LocalSigner {
    /// Wrap a key pair.
    #[must_use]
    pub fn new(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    fn scheme(&self) -> Scheme {
        self.key_pair.scheme()
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        crypto_sign(message, &self.key_pair, None)
            .map_err(|e| RelayError::Signer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::{verify, VerifyItem};

    #[tokio::test]
    async fn local_signer_produces_verifiable_signatures() {
        let pair = KeyPair::generate(Scheme::Ed25519).unwrap();
        let signer = LocalSigner::new(pair.clone());
        let signature = signer.sign(b"relay message").await.unwrap();
        let ok = verify(&VerifyItem {
            message: b"relay message",
            signature: &signature,
            public_key: signer.public_key(),
            scheme: Some(signer.scheme()),
        })
        .unwrap();
        assert!(ok);
    }
}
