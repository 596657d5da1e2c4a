//! `Key` — a KDF-derived symmetric secret, tagged with the engine that cut
//! it (§3, §4.10).
//!
//! Derivation uses HKDF-SHA256 the way `sha2`/`hkdf` are paired in any
//! password-to-key scheme; `Account::derive_key` (§4.10) is the only
//! caller, so the salt always comes from the account's own KDF salt.

use hkdf::Hkdf;
use sha2::Sha256;

/// A symmetric secret plus the engine identifier it was cut for — two keys
/// from different ciphers are never interchangeable even if the bytes
/// happen to be the same length.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    secret: Vec<u8>,
    engine_id: &'static str,
}

impl Key {
    pub fn new(secret: Vec<u8>, engine_id: &'static str) -> Self {
        Key { secret, engine_id }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.secret
    }

    pub fn engine_id(&self) -> &'static str {
        self.engine_id
    }

    /// Runs HKDF-SHA256 over `password` with `salt`, producing `len` bytes
    /// of key material (§4.10: `Account::deriveKey(len, salt)`).
    pub fn derive(password: &[u8], salt: &[u8], len: usize, engine_id: &'static str) -> Key {
        let hk = Hkdf::<Sha256>::new(Some(salt), password);
        let mut okm = vec![0u8; len];
        hk.expand(engine_id.as_bytes(), &mut okm).expect("HKDF output length within RFC 5869 bound");
        Key::new(okm, engine_id)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("engine_id", &self.engine_id).field("secret", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic_given_same_inputs() {
        let a = Key::derive(b"hunter2", b"salt0123456789ab", 16, "aes-128-ctr");
        let b = Key::derive(b"hunter2", b"salt0123456789ab", 16, "aes-128-ctr");
        assert_eq!(a.bytes(), b.bytes());
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = Key::derive(b"hunter2", b"salt0000000000aa", 16, "aes-128-ctr");
        let b = Key::derive(b"hunter2", b"salt0000000000bb", 16, "aes-128-ctr");
        assert_ne!(a.bytes(), b.bytes());
    }
}
