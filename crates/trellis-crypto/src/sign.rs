//! Sign/verify dispatch across the two schemes.

use ed25519_dalek::{Signer, SigningKey as DalekSigningKey, VerifyingKey as DalekVerifyingKey};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey as K256SigningKey, VerifyingKey as K256VerifyingKey};
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Result};
use crate::keys::{address_of_verifying_key, KeyPair, PublicKey};
use crate::scheme::{Scheme, ED25519_SIGNATURE_LEN, ETHSIGN_SIGNATURE_LEN};

/// Everything needed to verify one signature.
#[derive(Debug, Clone)]
pub struct VerifyItem<'a> {
    /// Message bytes that were signed.
    pub message: &'a [u8],
    /// Raw signature bytes.
    pub signature: &'a [u8],
    /// Public key (32-byte Ed25519 key or 20-byte address).
    pub public_key: &'a PublicKey,
    /// Explicit scheme; auto-detected from the key when `None`.
    pub scheme: Option<Scheme>,
}

/// Sign a message with the given key pair.
///
/// When `scheme` is given it must match the key pair's scheme; otherwise the
/// pair's own scheme is used.
pub fn sign(message: &[u8], key_pair: &KeyPair, scheme: Option<Scheme>) -> Result<Vec<u8>> {
    let scheme = match scheme {
        Some(requested) if requested != key_pair.scheme() => {
            return Err(CryptoError::SchemeMismatch {
                key: key_pair.scheme(),
                requested,
            })
        }
        Some(requested) => requested,
        None => key_pair.scheme(),
    };

    match scheme {
        Scheme::Ed25519 => {
            let signing = DalekSigningKey::from_bytes(key_pair.secret().as_bytes());
            Ok(signing.sign(message).to_bytes().to_vec())
        }
        Scheme::EthSign => {
            let signing = K256SigningKey::from_bytes(key_pair.secret().as_bytes().into())
                .map_err(|e| CryptoError::SecretKey(e.to_string()))?;
            let digest = signed_message_digest(message);
            let (signature, recovery) = signing
                .sign_prehash_recoverable(&digest)
                .map_err(|e| CryptoError::SecretKey(e.to_string()))?;
            let mut out = Vec::with_capacity(ETHSIGN_SIGNATURE_LEN);
            out.extend_from_slice(&signature.to_bytes());
            out.push(recovery.to_byte());
            Ok(out)
        }
    }
}

/// Verify one signature.
///
/// Returns `Ok(false)` on a signature that does not match; structural
/// problems (wrong lengths, unknown scheme) are errors.
pub fn verify(item: &VerifyItem<'_>) -> Result<bool> {
    let scheme = match item.scheme {
        Some(scheme) => scheme,
        None => Scheme::detect(item.public_key.as_bytes())?,
    };

    match scheme {
        Scheme::Ed25519 => verify_ed25519(item),
        Scheme::EthSign => verify_ethsign(item),
    }
}

/// Signature length for the scheme a public key belongs to (64 or 65).
pub fn signature_length(public_key: &PublicKey) -> Result<usize> {
    Ok(Scheme::detect(public_key.as_bytes())?.signature_length())
}

fn verify_ed25519(item: &VerifyItem<'_>) -> Result<bool> {
    if item.signature.len() != ED25519_SIGNATURE_LEN {
        return Err(CryptoError::SignatureLength {
            expected: ED25519_SIGNATURE_LEN,
            got: item.signature.len(),
        });
    }
    let key_bytes: [u8; 32] = item
        .public_key
        .as_bytes()
        .try_into()
        .map_err(|_| CryptoError::KeyLength(item.public_key.as_bytes().len()))?;
    let Ok(verifying) = DalekVerifyingKey::from_bytes(&key_bytes) else {
        // Not a valid curve point; the signature cannot match it.
        return Ok(false);
    };
    let sig_bytes: [u8; 64] = item
        .signature
        .try_into()
        .map_err(|_| CryptoError::SignatureLength {
            expected: ED25519_SIGNATURE_LEN,
            got: item.signature.len(),
        })?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    Ok(verifying.verify_strict(item.message, &signature).is_ok())
}

fn verify_ethsign(item: &VerifyItem<'_>) -> Result<bool> {
    if item.signature.len() != ETHSIGN_SIGNATURE_LEN {
        return Err(CryptoError::SignatureLength {
            expected: ETHSIGN_SIGNATURE_LEN,
            got: item.signature.len(),
        });
    }
    let digest = signed_message_digest(item.message);
    let Ok(signature) = K256Signature::from_slice(&item.signature[..64]) else {
        return Ok(false);
    };
    // Accept both the raw recovery id and the 27/28 convention.
    let v = item.signature[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let Some(recovery) = RecoveryId::from_byte(recovery_byte) else {
        return Ok(false);
    };
    let Ok(recovered) = K256VerifyingKey::recover_from_prehash(&digest, &signature, recovery)
    else {
        return Ok(false);
    };
    let address = address_of_verifying_key(&recovered);
    Ok(bool::from(address.ct_eq(item.public_key.as_bytes())))
}

/// Keccak-256 of the signed-message envelope:
/// `"\x19Ethereum Signed Message:\n" || decimal(len(m)) || m`.
fn signed_message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_sign_verify_round_trip() {
        let pair = KeyPair::generate(Scheme::Ed25519).unwrap();
        let message = b"\x68\x65\x6c\x6c\x6f";
        let signature = sign(message, &pair, None).unwrap();
        assert_eq!(signature_length(pair.public_key()).unwrap(), 64);

        let ok = verify(&VerifyItem {
            message,
            signature: &signature,
            public_key: pair.public_key(),
            scheme: None,
        })
        .unwrap();
        assert!(ok);

        // Flipping byte 0 of the signature falsifies it.
        let mut bad = signature.clone();
        bad[0] ^= 0xff;
        let ok = verify(&VerifyItem {
            message,
            signature: &bad,
            public_key: pair.public_key(),
            scheme: None,
        })
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn ethsign_sign_verify_round_trip() {
        let pair = KeyPair::generate(Scheme::EthSign).unwrap();
        let message = b"trellis signed message";
        let signature = sign(message, &pair, None).unwrap();
        assert_eq!(signature.len(), 65);
        assert_eq!(signature_length(pair.public_key()).unwrap(), 65);

        let ok = verify(&VerifyItem {
            message,
            signature: &signature,
            public_key: pair.public_key(),
            scheme: None,
        })
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn ethsign_accepts_legacy_v() {
        let pair = KeyPair::generate(Scheme::EthSign).unwrap();
        let message = b"legacy v";
        let mut signature = sign(message, &pair, None).unwrap();
        signature[64] += 27;

        let ok = verify(&VerifyItem {
            message,
            signature: &signature,
            public_key: pair.public_key(),
            scheme: None,
        })
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn ethsign_rejects_wrong_signer() {
        let signer = KeyPair::generate(Scheme::EthSign).unwrap();
        let other = KeyPair::generate(Scheme::EthSign).unwrap();
        let message = b"who signed this";
        let signature = sign(message, &signer, None).unwrap();

        let ok = verify(&VerifyItem {
            message,
            signature: &signature,
            public_key: other.public_key(),
            scheme: None,
        })
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn tampered_message_fails_both_schemes() {
        for scheme in [Scheme::Ed25519, Scheme::EthSign] {
            let pair = KeyPair::generate(scheme).unwrap();
            let signature = sign(b"payload", &pair, None).unwrap();
            let ok = verify(&VerifyItem {
                message: b"payloae",
                signature: &signature,
                public_key: pair.public_key(),
                scheme: Some(scheme),
            })
            .unwrap();
            assert!(!ok, "{scheme} accepted a tampered message");
        }
    }

    #[test]
    fn scheme_mismatch_is_rejected() {
        let pair = KeyPair::generate(Scheme::Ed25519).unwrap();
        assert!(matches!(
            sign(b"m", &pair, Some(Scheme::EthSign)),
            Err(CryptoError::SchemeMismatch { .. })
        ));
    }
}
