//! Work proof over a model's signed area.
//!
//! A model with `difficulty > 0` must carry a nonce at field 127 such that
//! the hex rendering of `blake2b(hash_fields(packed, 0, 126) || nonce)`
//! compares greater than or equal to the difficulty threshold string. The
//! nonce sits above the last signature slot, so solving work never changes
//! `id1`.

use tracing::debug;
use trellis_codec::hash_fields;
use trellis_crypto::hash;

use crate::error::{ModelError, Result};

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 8;

/// Upper bound on difficulty; beyond this the threshold string would exceed
/// the digest's hex width.
pub const MAX_DIFFICULTY: u8 = 64;

/// Threshold string for a difficulty.
///
/// The string carries `bits` leading 1-bits rendered as hex: 4 → `"f"`,
/// 5 → `"1f"`, 8 → `"ff"`. The work hash's hex rendering must compare
/// greater than or equal to it.
#[must_use]
pub fn work_threshold(bits: u8) -> String {
    let full = (bits / 4) as usize;
    let rem = bits % 4;
    let mut threshold = String::with_capacity(full + 1);
    if rem > 0 {
        let partial = (1u8 << rem) - 1;
        threshold.push(char::from_digit(u32::from(partial), 16).unwrap_or('0'));
    }
    for _ in 0..full {
        threshold.push('f');
    }
    threshold
}

/// The digest the nonce must beat: `blake2b(signed-area hash || nonce)`.
fn work_hash(packed: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<[u8; 32]> {
    let base = hash_fields(packed, 0, 126)?;
    let mut message = Vec::with_capacity(32 + NONCE_LEN);
    message.extend_from_slice(&base);
    message.extend_from_slice(nonce);
    Ok(hash(&message))
}

fn meets_threshold(digest: &[u8; 32], threshold: &str) -> bool {
    hex::encode(digest).as_str() >= threshold
}

/// Search for a nonce satisfying `difficulty` over the packed signed area.
///
/// `packed` must not yet contain the nonce field. The search walks a `u64`
/// counter; expected work doubles per difficulty bit.
pub fn solve_work(packed: &[u8], difficulty: u8) -> Result<[u8; NONCE_LEN]> {
    if difficulty == 0 || difficulty > MAX_DIFFICULTY {
        return Err(ModelError::Work(format!(
            "difficulty {difficulty} outside 1..={MAX_DIFFICULTY}"
        )));
    }
    let threshold = work_threshold(difficulty);
    let mut counter: u64 = 0;
    loop {
        let nonce = counter.to_be_bytes();
        let digest = work_hash(packed, &nonce)?;
        if meets_threshold(&digest, &threshold) {
            debug!(difficulty, attempts = counter + 1, "work proof solved");
            return Ok(nonce);
        }
        counter = counter.checked_add(1).ok_or_else(|| {
            ModelError::Work("nonce space exhausted".to_string())
        })?;
    }
}

/// Check a nonce against the declared difficulty.
pub fn verify_work(packed: &[u8], difficulty: u8, nonce: &[u8; NONCE_LEN]) -> Result<bool> {
    if difficulty == 0 {
        return Ok(true);
    }
    if difficulty > MAX_DIFFICULTY {
        return Err(ModelError::Work(format!(
            "difficulty {difficulty} outside 1..={MAX_DIFFICULTY}"
        )));
    }
    let digest = work_hash(packed, nonce)?;
    Ok(meets_threshold(&digest, &work_threshold(difficulty)))
}
