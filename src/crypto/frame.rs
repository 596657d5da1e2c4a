//! `NetFrame` wire codec (§4.8, §6): length-prefixed, CRC-checked,
//! block-padded ciphertext frames.
//!
//! ```text
//! empty     := u8 type, u32 zero           // payload.is_empty()
//! encrypted := u8 type, u32 payload_len, u32 crc32(padded cleartext),
//!              u8[iv_size] iv, u8[ceil(payload_len/block)*block] ciphertext
//! ```

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::crypto::cipher::Cipher;
use crate::crypto::key::Key;
use crate::crypto::random::Random;
use crate::error::NetError;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FrameType {
    Data,
    KeyChange,
}

impl FrameType {
    fn to_byte(self) -> u8 {
        match self {
            FrameType::Data => 0,
            FrameType::KeyChange => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<FrameType, NetError> {
        match byte {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::KeyChange),
            _ => Err(NetError::InvalidFrame),
        }
    }
}

/// A decoded frame: its control type plus cleartext payload (empty for
/// every `KeyChange`, which carries no data).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NetFrame {
    pub frame_type: FrameType,
    pub payload: Vec<u8>,
}

impl NetFrame {
    pub fn data(payload: Vec<u8>) -> NetFrame {
        NetFrame { frame_type: FrameType::Data, payload }
    }

    pub fn key_change() -> NetFrame {
        NetFrame { frame_type: FrameType::KeyChange, payload: Vec::new() }
    }

    fn padded_len(&self, block: usize) -> usize {
        if self.payload.is_empty() {
            0
        } else {
            ((self.payload.len() + block - 1) / block) * block
        }
    }

    /// Encrypts and serialises this frame. A fresh random IV is drawn per
    /// call (§4.8: "IV is fresh-random per frame").
    pub fn encode(&self, cipher: &dyn Cipher, key: &Key, random: &dyn Random) -> Result<Vec<u8>, NetError> {
        if self.payload.is_empty() {
            let mut out = Vec::with_capacity(5);
            out.push(self.frame_type.to_byte());
            out.extend_from_slice(&0u32.to_le_bytes());
            return Ok(out);
        }

        let block = cipher.block_size();
        let iv = random.bytes(cipher.iv_size());
        let padded_len = self.padded_len(block);
        let mut cleartext = self.payload.clone();
        cleartext.resize(padded_len, 0);
        let ciphertext = cipher.encrypt(&cleartext, key, &iv)?;
        let crc = CRC32.checksum(&cleartext);

        let mut out = Vec::with_capacity(5 + 4 + iv.len() + ciphertext.len());
        out.push(self.frame_type.to_byte());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Attempts to decode one frame from the front of `buf`. Returns
    /// `Ok(None)` when more bytes are needed, `Ok(Some((frame, consumed)))`
    /// on success, `Err` on a protocol violation the caller must close the
    /// socket for (§4.8 decode policy).
    pub fn decode(buf: &[u8], cipher: &dyn Cipher, key: &Key) -> Result<Option<(NetFrame, usize)>, NetError> {
        if buf.len() < 5 {
            return Ok(None);
        }
        let frame_type = FrameType::from_byte(buf[0])?;
        let len_field = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;

        if len_field == 0 {
            return Ok(Some((NetFrame { frame_type, payload: Vec::new() }, 5)));
        }

        let iv_size = cipher.iv_size();
        let block = cipher.block_size();
        let padded_len = ((len_field + block - 1) / block) * block;
        let total = 5 + 4 + iv_size + padded_len;
        if buf.len() < total {
            return Ok(None);
        }

        let crc_field = u32::from_le_bytes([buf[5], buf[6], buf[7], buf[8]]);
        let iv = &buf[9..9 + iv_size];
        let ciphertext = &buf[9 + iv_size..total];

        let cleartext = cipher.decrypt(ciphertext, key, iv)?;
        if cleartext.len() != padded_len {
            return Err(NetError::InvalidFrame);
        }
        let crc = CRC32.checksum(&cleartext);
        if crc != crc_field {
            return Err(NetError::InvalidFrame);
        }
        let payload = cleartext[..len_field].to_vec();

        Ok(Some((NetFrame { frame_type, payload }, total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::{AesCtr128, AES_CTR_128_ENGINE_ID};
    use crate::crypto::random::OsRandom;

    fn key() -> Key {
        Key::derive(b"password", b"saltsaltsaltsalt", 16, AES_CTR_128_ENGINE_ID)
    }

    #[test]
    fn empty_key_change_frame_round_trips_in_five_bytes() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::key_change();
        let bytes = frame.encode(&cipher, &key, &random).unwrap();
        assert_eq!(bytes.len(), 5);
        let (decoded, consumed) = NetFrame::decode(&bytes, &cipher, &key).unwrap().unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(decoded, frame);
    }

    #[test]
    fn data_frame_round_trips_with_arbitrary_payload() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::data(b"hello, sloked".to_vec());
        let bytes = frame.encode(&cipher, &key, &random).unwrap();
        let (decoded, consumed) = NetFrame::decode(&bytes, &cipher, &key).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.payload, b"hello, sloked".to_vec());
    }

    #[test]
    fn truncated_buffer_asks_for_more_bytes() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::data(b"some payload that spans a block".to_vec());
        let bytes = frame.encode(&cipher, &key, &random).unwrap();
        assert!(NetFrame::decode(&bytes[..bytes.len() - 1], &cipher, &key).unwrap().is_none());
    }

    #[test]
    fn flipped_ciphertext_bit_produces_invalid_frame() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::data(b"tamper with me".to_vec());
        let mut bytes = frame.encode(&cipher, &key, &random).unwrap();
        // First ciphertext byte: within the real payload, not the zero padding.
        let ciphertext_start = 1 + 4 + 4 + cipher.iv_size();
        bytes[ciphertext_start] ^= 0x01;
        assert_eq!(NetFrame::decode(&bytes, &cipher, &key), Err(NetError::InvalidFrame));
    }

    #[test]
    fn flipped_padding_byte_produces_invalid_frame() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::data(b"tamper with me".to_vec());
        let mut bytes = frame.encode(&cipher, &key, &random).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(NetFrame::decode(&bytes, &cipher, &key), Err(NetError::InvalidFrame));
    }

    #[test]
    fn flipped_crc_field_produces_invalid_frame() {
        let cipher = AesCtr128;
        let random = OsRandom;
        let key = key();
        let frame = NetFrame::data(b"tamper with crc".to_vec());
        let mut bytes = frame.encode(&cipher, &key, &random).unwrap();
        bytes[5] ^= 0x01;
        assert_eq!(NetFrame::decode(&bytes, &cipher, &key), Err(NetError::InvalidFrame));
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let cipher = AesCtr128;
        let key = key();
        let bytes = vec![2u8, 0, 0, 0, 0];
        assert_eq!(NetFrame::decode(&bytes, &cipher, &key), Err(NetError::InvalidFrame));
    }
}
