//! PKCE (Proof Key for Code Exchange) secrets for the authorization-code grant
//!
//! Implements the S256 method of RFC 7636.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the code verifier (RFC 7636 maximum)
pub const VERIFIER_LENGTH: usize = 128;

/// Unreserved URI characters allowed in a verifier
const VERIFIER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Generate a random code verifier
pub fn generate_verifier() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFIER_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..VERIFIER_CHARSET.len());
            VERIFIER_CHARSET[idx] as char
        })
        .collect()
}

/// BASE64URL(SHA256(verifier)) without padding
pub fn derive_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// One-shot verifier/challenge pair for a single login attempt.
///
/// Deliberately not `Clone` or serializable: it is moved into the token
/// exchange and dropped there.
#[derive(Debug)]
pub struct PkceSecret {
    verifier: String,
    challenge: String,
}

impl PkceSecret {
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = derive_challenge(&verifier);
        Self { verifier, challenge }
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Consume the secret, yielding the verifier for the token exchange
    pub fn into_verifier(self) -> String {
        self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_length_and_charset() {
        let verifier = generate_verifier();
        assert_eq!(verifier.len(), VERIFIER_LENGTH);
        for b in verifier.bytes() {
            assert!(VERIFIER_CHARSET.contains(&b), "Invalid character in verifier: {}", b as char);
        }
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(derive_challenge(verifier), derive_challenge(verifier));
        // RFC 7636 appendix B
        assert_eq!(
            derive_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_challenge_is_url_safe() {
        for _ in 0..50 {
            let challenge = derive_challenge(&generate_verifier());
            assert_eq!(challenge.len(), 43);
            assert!(!challenge.contains('+'));
            assert!(!challenge.contains('/'));
            assert!(!challenge.contains('='));
        }
    }

    #[test]
    fn test_secret_matches_challenge() {
        let secret = PkceSecret::generate();
        let challenge = secret.challenge().to_string();
        let verifier = secret.into_verifier();
        assert_eq!(derive_challenge(&verifier), challenge);
    }

    #[test]
    fn test_verifiers_are_unique() {
        assert_ne!(generate_verifier(), generate_verifier());
    }
}
