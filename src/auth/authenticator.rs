//! `Authenticator` — the master/slave challenge-response handshake
//! (§4.10).
//!
//! The challenge token is always derived with a fixed, un-transmitted
//! salt (`AUTH_SALT`): both sides know it, so it never crosses the wire.
//! The *session* key installed on `finalizeLogin` uses a fresh random
//! salt instead, which the net layer (§4.9's `auth-response`) carries
//! across alongside the boolean result — spec.md states the handshake
//! abstractly and leaves this transport detail open; recorded as a
//! resolved Open Question.

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::account::{Account, WatchHandle};
use crate::auth::credential_master::CredentialMaster;
use crate::crypto::cipher::Cipher;
use crate::crypto::key::Key;
use crate::crypto::random::Random;
use crate::error::AuthError;

/// Bytes of random nonce generated per `initiateLogin` (§4.10: "a random
/// nonce of `sizeof(Challenge)` bytes").
pub const CHALLENGE_SIZE: usize = 16;

const AUTH_SALT: &[u8; 16] = b"sloked-auth-salt";

fn challenge_key(cipher: &dyn Cipher, password: &[u8]) -> Key {
    Key::derive(password, AUTH_SALT, cipher.block_size(), cipher.engine_id())
}

fn challenge_token(cipher: &dyn Cipher, password: &[u8], nonce: &[u8]) -> Result<String, AuthError> {
    if cipher.block_size() < CHALLENGE_SIZE {
        return Err(AuthError::UnsupportedCipher);
    }
    let key = challenge_key(cipher, password);
    let zero_iv = vec![0u8; cipher.iv_size()];
    let ciphertext = cipher.encrypt(nonce, &key, &zero_iv).map_err(|_| AuthError::NotAuthenticated)?;
    Ok(BASE64.encode(ciphertext))
}

type SetupEncryption = Box<dyn Fn(&Key) + Send + Sync>;

/// Server-side half of the handshake: owns the `CredentialMaster`,
/// verifies tokens, and installs the session key once login finalises.
pub struct MasterAuthenticator {
    credential_master: Arc<CredentialMaster>,
    cipher: Arc<dyn Cipher>,
    random: Arc<dyn Random>,
    on_setup_encryption: SetupEncryption,
    pending_nonce: Mutex<Option<Vec<u8>>>,
    bound_account: Mutex<Option<Arc<Account>>>,
    pending_session_key: Mutex<Option<(Arc<Account>, Key)>>,
    watch: Mutex<Option<WatchHandle>>,
}

impl MasterAuthenticator {
    pub fn new(
        credential_master: Arc<CredentialMaster>,
        cipher: Arc<dyn Cipher>,
        random: Arc<dyn Random>,
        on_setup_encryption: impl Fn(&Key) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(MasterAuthenticator {
            credential_master,
            cipher,
            random,
            on_setup_encryption: Box::new(on_setup_encryption),
            pending_nonce: Mutex::new(None),
            bound_account: Mutex::new(None),
            pending_session_key: Mutex::new(None),
            watch: Mutex::new(None),
        })
    }

    pub fn bound_account(&self) -> Arc<Account> {
        self.bound_account.lock().unwrap().clone().unwrap_or_else(|| self.credential_master.default_account())
    }

    /// §4.10 step 1.
    pub fn initiate_login(&self) -> Result<Vec<u8>, AuthError> {
        if self.cipher.block_size() < CHALLENGE_SIZE {
            return Err(AuthError::UnsupportedCipher);
        }
        let nonce = self.random.bytes(CHALLENGE_SIZE);
        *self.pending_nonce.lock().unwrap() = Some(nonce.clone());
        *self.bound_account.lock().unwrap() = None;
        Ok(nonce)
    }

    /// §4.10 step 2.
    pub fn continue_login(&self, account_name: &str, token: &str) -> Result<(), AuthError> {
        let nonce = self.pending_nonce.lock().unwrap().clone().ok_or(AuthError::LoginNotInitiated)?;
        let account = self.credential_master.get(account_name).ok_or_else(|| AuthError::UnknownAccount(account_name.to_string()))?;
        let expected = challenge_token(self.cipher.as_ref(), &account.password_for_auth(), &nonce)?;
        if expected != token {
            return Err(AuthError::NotAuthenticated);
        }
        *self.bound_account.lock().unwrap() = Some(account);
        *self.pending_nonce.lock().unwrap() = None;
        Ok(())
    }

    /// §4.10 step 3: derives the session key and returns the fresh salt
    /// used for it, which the caller (the net layer) forwards to the peer
    /// so it can re-derive the same key. Does **not** install the key on
    /// the socket yet — the net layer must reply to `auth-response` with
    /// this salt under the *current* (pre-rotation) key first, then call
    /// `commit_session_key` (§4.8: a key switch only governs frames sent
    /// after it takes effect).
    pub fn finalize_login(self: &Arc<Self>) -> Result<Vec<u8>, AuthError> {
        let account = self.bound_account.lock().unwrap().clone().ok_or(AuthError::NotAuthenticated)?;
        let salt = self.random.bytes(self.cipher.iv_size());
        let key = account.derive_key(self.cipher.block_size(), &salt, self.cipher.engine_id());
        *self.pending_session_key.lock().unwrap() = Some((account, key));
        Ok(salt)
    }

    /// Installs the key derived by the last `finalize_login` call and
    /// subscribes to future password rotations on the bound account. Call
    /// once the reply carrying its salt has actually been written to the
    /// socket.
    pub fn commit_session_key(self: &Arc<Self>) {
        if let Some((account, key)) = self.pending_session_key.lock().unwrap().take() {
            (self.on_setup_encryption)(&key);
            let this = self.clone();
            let account_for_watch = account.clone();
            let handle = account.watch(move || {
                let _ = this.setup_encryption(&account_for_watch, false);
            });
            *self.watch.lock().unwrap() = Some(handle);
        }
    }

    /// Password-rotation path (§4.10 supplement): no reply to sequence
    /// against, so the key installs immediately.
    fn setup_encryption(self: &Arc<Self>, account: &Arc<Account>, notify: bool) -> Result<Vec<u8>, AuthError> {
        let salt = self.random.bytes(self.cipher.iv_size());
        let key = account.derive_key(self.cipher.block_size(), &salt, self.cipher.engine_id());
        (self.on_setup_encryption)(&key);
        if notify {
            let this = self.clone();
            let account_for_watch = account.clone();
            let handle = account.watch(move || {
                let _ = this.setup_encryption(&account_for_watch, false);
            });
            *self.watch.lock().unwrap() = Some(handle);
        }
        Ok(salt)
    }
}

/// Client-side half: mirrors the token computation and installs the
/// session key once the master confirms (§4.10: "when the master's
/// key-change event fires with the expected id, the slave confirms the
/// login locally").
pub struct SlaveAuthenticator {
    cipher: Arc<dyn Cipher>,
    on_setup_encryption: SetupEncryption,
}

impl SlaveAuthenticator {
    pub fn new(cipher: Arc<dyn Cipher>, on_setup_encryption: impl Fn(&Key) + Send + Sync + 'static) -> Self {
        SlaveAuthenticator { cipher, on_setup_encryption: Box::new(on_setup_encryption) }
    }

    /// Computes the response token for a master-issued nonce.
    pub fn initiate_login(&self, nonce: &[u8], password: &[u8]) -> Result<String, AuthError> {
        challenge_token(self.cipher.as_ref(), password, nonce)
    }

    /// Installs the session key once the master's finalize notification
    /// (carrying its fresh salt) arrives.
    pub fn confirm(&self, password: &[u8], salt: &[u8]) {
        let key = Key::derive(password, salt, self.cipher.block_size(), self.cipher.engine_id());
        (self.on_setup_encryption)(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::AesCtr128;
    use crate::crypto::random::OsRandom;

    fn cipher() -> Arc<dyn Cipher> {
        Arc::new(AesCtr128)
    }

    #[test]
    fn full_handshake_installs_matching_session_key() {
        let credential_master = Arc::new(CredentialMaster::new(Arc::new(OsRandom)));
        let account = credential_master.create_account("alice").unwrap();
        let password = account.password_for_auth();

        let master_key = Arc::new(Mutex::new(None));
        let master_key2 = master_key.clone();
        let master = MasterAuthenticator::new(credential_master, cipher(), Arc::new(OsRandom), move |k| {
            *master_key2.lock().unwrap() = Some(k.clone());
        });

        let slave_key = Arc::new(Mutex::new(None));
        let slave_key2 = slave_key.clone();
        let slave = SlaveAuthenticator::new(cipher(), move |k| {
            *slave_key2.lock().unwrap() = Some(k.clone());
        });

        let nonce = master.initiate_login().unwrap();
        let token = slave.initiate_login(&nonce, &password).unwrap();
        master.continue_login("alice", &token).unwrap();
        let salt = master.finalize_login().unwrap();
        master.commit_session_key();
        slave.confirm(&password, &salt);

        assert_eq!(master_key.lock().unwrap().as_ref().unwrap().bytes(), slave_key.lock().unwrap().as_ref().unwrap().bytes());
    }

    #[test]
    fn wrong_token_is_rejected() {
        let credential_master = Arc::new(CredentialMaster::new(Arc::new(OsRandom)));
        credential_master.create_account("alice").unwrap();
        let master = MasterAuthenticator::new(credential_master, cipher(), Arc::new(OsRandom), |_| {});
        master.initiate_login().unwrap();
        assert!(matches!(master.continue_login("alice", "bogus"), Err(AuthError::NotAuthenticated)));
    }

    #[test]
    fn continue_without_initiate_fails() {
        let credential_master = Arc::new(CredentialMaster::new(Arc::new(OsRandom)));
        credential_master.create_account("alice").unwrap();
        let master = MasterAuthenticator::new(credential_master, cipher(), Arc::new(OsRandom), |_| {});
        assert!(matches!(master.continue_login("alice", "x"), Err(AuthError::LoginNotInitiated)));
    }
}
