//! Authorization-token validation.
//!
//! The shipped implementation is a format and entropy pre-filter, not a
//! cryptographic verification: it rejects tokens that are too short, not
//! hexadecimal, or too low-entropy to be key material, and nothing more. It
//! never checks the token against the sender's public key, so it cannot
//! prove the sender authorized the transfer. The `SignatureValidator` trait
//! exists so a real asymmetric scheme can replace it without touching the
//! submission or dispatch paths.

/// Narrow seam for the authorization check.
pub trait SignatureValidator: Send + Sync {
    /// Returns whether `token` is acceptable for a transfer from `sender`.
    fn validate(&self, token: &str, sender: &str) -> bool;
}

/// Minimum token length accepted by the entropy heuristic.
pub const MIN_TOKEN_LENGTH: usize = 128;

/// Normalized Shannon-entropy threshold on a 0–1 scale.
pub const ENTROPY_THRESHOLD: f64 = 0.8;

/// Maximum entropy of the hex alphabet, in bits per character.
const HEX_MAX_ENTROPY_BITS: f64 = 4.0;

/// Heuristic token checker: length, hex alphabet, character entropy.
#[derive(Debug, Default, Clone)]
pub struct EntropyValidator;

impl EntropyValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureValidator for EntropyValidator {
    fn validate(&self, token: &str, _sender: &str) -> bool {
        if token.len() < MIN_TOKEN_LENGTH {
            return false;
        }
        if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        normalized_entropy(token) > ENTROPY_THRESHOLD
    }
}

/// Shannon entropy of the token's characters divided by the hex maximum,
/// yielding a 0–1 score.
fn normalized_entropy(token: &str) -> f64 {
    let mut counts = [0usize; 256];
    for b in token.bytes() {
        counts[b as usize] += 1;
    }
    let len = token.len() as f64;
    let entropy_bits: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum();
    entropy_bits / HEX_MAX_ENTROPY_BITS
}
