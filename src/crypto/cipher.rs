//! `Cipher` — block/IV size plus encrypt/decrypt over a `Key` (§3).
//!
//! `AesCtr128` is the one engine the core ships, the same construction
//! `tokamak-network-ethrex`'s RLPx transport uses for its own
//! length-prefixed encrypted frames: AES-128 in CTR mode with a
//! 64-bit big-endian counter (`ctr::Ctr64BE<aes::Aes128>`).

use aes::cipher::{KeyIvInit, StreamCipher};

use crate::crypto::key::Key;
use crate::error::NetError;

type Aes128Ctr64BE = ctr::Ctr64BE<aes::Aes128>;

pub const AES_CTR_128_ENGINE_ID: &str = "aes-128-ctr";

/// A symmetric cipher engine: fixed block/IV sizes, stateless
/// encrypt/decrypt over a key and a caller-supplied IV. CTR mode makes
/// `encrypt`/`decrypt` the same keystream XOR, but the trait keeps them
/// distinct so a future block-cipher-mode engine isn't forced into that
/// shape.
pub trait Cipher: Send + Sync {
    fn engine_id(&self) -> &'static str;
    fn block_size(&self) -> usize;
    fn iv_size(&self) -> usize;
    fn encrypt(&self, data: &[u8], key: &Key, iv: &[u8]) -> Result<Vec<u8>, NetError>;
    fn decrypt(&self, data: &[u8], key: &Key, iv: &[u8]) -> Result<Vec<u8>, NetError>;
}

/// AES-128 in CTR mode. Block size 16 governs `NetFrame` ciphertext
/// padding (§4.8); IV size 16 matches the cipher's block size.
#[derive(Debug, Default)]
pub struct AesCtr128;

impl Cipher for AesCtr128 {
    fn engine_id(&self) -> &'static str {
        AES_CTR_128_ENGINE_ID
    }

    fn block_size(&self) -> usize {
        16
    }

    fn iv_size(&self) -> usize {
        16
    }

    fn encrypt(&self, data: &[u8], key: &Key, iv: &[u8]) -> Result<Vec<u8>, NetError> {
        apply_keystream(data, key, iv)
    }

    fn decrypt(&self, data: &[u8], key: &Key, iv: &[u8]) -> Result<Vec<u8>, NetError> {
        apply_keystream(data, key, iv)
    }
}

fn apply_keystream(data: &[u8], key: &Key, iv: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut cipher = Aes128Ctr64BE::new_from_slices(key.bytes(), iv).map_err(|_| NetError::CryptoFailure)?;
    let mut out = data.to_vec();
    cipher.try_apply_keystream(&mut out).map_err(|_| NetError::CryptoFailure)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_undoes_encrypt() {
        let key = Key::derive(b"s3cret", b"0123456789abcdef", 16, AES_CTR_128_ENGINE_ID);
        let iv = [7u8; 16];
        let cipher = AesCtr128;
        let plaintext = b"the quick brown fox jumps".to_vec();
        let ciphertext = cipher.encrypt(&plaintext, &key, &iv).unwrap();
        assert_ne!(ciphertext, plaintext);
        let decrypted = cipher.decrypt(&ciphertext, &key, &iv).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn different_iv_yields_different_ciphertext() {
        let key = Key::derive(b"s3cret", b"0123456789abcdef", 16, AES_CTR_128_ENGINE_ID);
        let cipher = AesCtr128;
        let plaintext = b"identical payload".to_vec();
        let a = cipher.encrypt(&plaintext, &key, &[1u8; 16]).unwrap();
        let b = cipher.encrypt(&plaintext, &key, &[2u8; 16]).unwrap();
        assert_ne!(a, b);
    }
}
