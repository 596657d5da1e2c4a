//! `CryptoSocket` — a `TcpStream` wrapped in the `NetFrame` codec, with
//! runtime key rotation and an `autoDecrypt` toggle (§4.8).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use crate::crypto::cipher::Cipher;
use crate::crypto::frame::{FrameType, NetFrame};
use crate::crypto::key::Key;
use crate::crypto::random::Random;
use crate::error::NetError;

type KeyChangeListener = Box<dyn Fn() + Send + Sync>;

struct EncryptionState {
    current: Key,
    default: Key,
    stashed: bool,
}

/// Framed, encrypted socket. One reader thread drains `TcpStream` into
/// `read_buf` and decodes complete frames off the front (§5: "socket
/// buffers are owned by one reader thread").
pub struct CryptoSocket {
    stream: Mutex<TcpStream>,
    cipher: Arc<dyn Cipher>,
    random: Arc<dyn Random>,
    encryption: Mutex<EncryptionState>,
    read_buf: Mutex<Vec<u8>>,
    auto_decrypt: Mutex<bool>,
    key_change_listener: Mutex<Option<KeyChangeListener>>,
}

impl CryptoSocket {
    pub fn new(stream: TcpStream, cipher: Arc<dyn Cipher>, random: Arc<dyn Random>, key: Key) -> Self {
        CryptoSocket {
            stream: Mutex::new(stream),
            cipher,
            random,
            encryption: Mutex::new(EncryptionState { current: key.clone(), default: key, stashed: false }),
            read_buf: Mutex::new(Vec::new()),
            auto_decrypt: Mutex::new(true),
            key_change_listener: Mutex::new(None),
        }
    }

    pub fn set_auto_decrypt(&self, enabled: bool) {
        *self.auto_decrypt.lock().unwrap() = enabled;
    }

    pub fn auto_decrypt(&self) -> bool {
        *self.auto_decrypt.lock().unwrap()
    }

    /// Installs `key` as the active encryption key, stashing whatever was
    /// active as the default the first time this is called (§4.8).
    pub fn set_encryption(&self, key: Key) {
        let mut state = self.encryption.lock().unwrap();
        if !state.stashed {
            state.default = state.current.clone();
            state.stashed = true;
        }
        state.current = key;
    }

    pub fn restore_default_encryption(&self) {
        let mut state = self.encryption.lock().unwrap();
        state.current = state.default.clone();
    }

    pub fn current_key(&self) -> Key {
        self.encryption.lock().unwrap().current.clone()
    }

    pub fn set_key_change_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        *self.key_change_listener.lock().unwrap() = Some(Box::new(listener));
    }

    /// Shuts the underlying stream down in both directions, unblocking
    /// any thread parked in `recv`.
    pub fn close(&self) {
        let _ = self.stream.lock().unwrap().shutdown(std::net::Shutdown::Both);
    }

    /// Writes `payload` as a `Data` frame under the current key.
    pub fn send(&self, payload: Vec<u8>) -> Result<(), NetError> {
        self.send_frame(NetFrame::data(payload))
    }

    /// Sends the `KeyChange` control frame — the host calls this after it
    /// has negotiated and installed a new key locally via `set_encryption`.
    pub fn send_key_change(&self) -> Result<(), NetError> {
        self.send_frame(NetFrame::key_change())
    }

    fn send_frame(&self, frame: NetFrame) -> Result<(), NetError> {
        let key = self.current_key();
        let bytes = frame.encode(self.cipher.as_ref(), &key, self.random.as_ref())?;
        let mut stream = self.stream.lock().unwrap();
        stream.write_all(&bytes)?;
        Ok(())
    }

    /// Blocks for and returns the next `Data` frame's payload, decrypting
    /// it if `autoDecrypt` is on (the default) — the only case §4.8 leaves
    /// undecrypted is the key-renegotiation window, where the host drains
    /// frames itself.
    pub fn recv(&self) -> Result<Vec<u8>, NetError> {
        loop {
            let frame = self.recv_frame()?;
            match frame.frame_type {
                FrameType::Data => return Ok(frame.payload),
                FrameType::KeyChange => {
                    if let Some(listener) = self.key_change_listener.lock().unwrap().as_ref() {
                        listener();
                    }
                }
            }
        }
    }

    fn recv_frame(&self) -> Result<NetFrame, NetError> {
        loop {
            {
                let key = self.current_key();
                let mut buf = self.read_buf.lock().unwrap();
                if let Some((frame, consumed)) = NetFrame::decode(&buf, self.cipher.as_ref(), &key)? {
                    buf.drain(..consumed);
                    return Ok(frame);
                }
            }
            let mut chunk = [0u8; 4096];
            let mut stream = self.stream.lock().unwrap();
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(NetError::Closed);
            }
            drop(stream);
            self.read_buf.lock().unwrap().extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::{AesCtr128, AES_CTR_128_ENGINE_ID};
    use crate::crypto::random::OsRandom;
    use std::net::TcpListener;

    fn key(salt: &[u8]) -> Key {
        Key::derive(b"password", salt, 16, AES_CTR_128_ENGINE_ID)
    }

    fn paired_sockets() -> (CryptoSocket, CryptoSocket) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client_thread = std::thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server_stream, _) = listener.accept().unwrap();
        let client_stream = client_thread.join().unwrap();
        let k = key(b"0123456789abcdef");
        let server = CryptoSocket::new(server_stream, Arc::new(AesCtr128), Arc::new(OsRandom), k.clone());
        let client = CryptoSocket::new(client_stream, Arc::new(AesCtr128), Arc::new(OsRandom), k);
        (server, client)
    }

    #[test]
    fn send_then_recv_round_trips_payload() {
        let (server, client) = paired_sockets();
        server.send(b"hello over the wire".to_vec()).unwrap();
        assert_eq!(client.recv().unwrap(), b"hello over the wire".to_vec());
    }

    #[test]
    fn key_change_frame_fires_listener_and_is_not_returned_as_data() {
        let (server, client) = paired_sockets();
        let hit = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let hit2 = hit.clone();
        client.set_key_change_listener(move || hit2.store(true, std::sync::atomic::Ordering::SeqCst));
        server.send_key_change().unwrap();
        server.send(b"after rotation".to_vec()).unwrap();
        assert_eq!(client.recv().unwrap(), b"after rotation".to_vec());
        assert!(hit.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn set_encryption_then_restore_round_trips_through_both_keys() {
        let (server, client) = paired_sockets();
        let rotated = key(b"fedcba9876543210");
        server.set_encryption(rotated.clone());
        client.set_encryption(rotated);
        server.send(b"under rotated key".to_vec()).unwrap();
        assert_eq!(client.recv().unwrap(), b"under rotated key".to_vec());

        server.restore_default_encryption();
        client.restore_default_encryption();
        server.send(b"back to default".to_vec()).unwrap();
        assert_eq!(client.recv().unwrap(), b"back to default".to_vec());
    }
}
