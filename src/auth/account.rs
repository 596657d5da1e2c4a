//! `Account` — name, password, and restriction lists (§3, §4.10).

use std::sync::{Arc, Mutex};

use crate::auth::restriction::NamedRestriction;
use crate::crypto::key::Key;

type PasswordListener = Box<dyn Fn() + Send + Sync>;

struct AccountState {
    password: Vec<u8>,
    listeners: Vec<(u64, PasswordListener)>,
    next_listener: u64,
}

/// `(name, password, access-restrictions, modification-restrictions)`
/// (§3). `watch`/`unwatch` let the authenticator re-derive a session key
/// whenever the password rotates mid-session (§4.10 supplement).
pub struct Account {
    name: String,
    state: Mutex<AccountState>,
    pub access: NamedRestriction,
    pub modification: NamedRestriction,
}

/// Handle returned by `Account::watch`; drop or call `unwatch` to stop
/// receiving password-rotation notifications.
pub struct WatchHandle {
    account: Arc<Account>,
    id: u64,
}

impl WatchHandle {
    pub fn unwatch(self) {
        self.account.state.lock().unwrap().listeners.retain(|(id, _)| *id != self.id);
    }
}

impl Account {
    pub fn new(name: impl Into<String>, password: Vec<u8>) -> Account {
        Account {
            name: name.into(),
            state: Mutex::new(AccountState { password, listeners: Vec::new(), next_listener: 0 }),
            access: NamedRestriction::new(),
            modification: NamedRestriction::new(),
        }
    }

    pub fn with_restrictions(mut self, access: NamedRestriction, modification: NamedRestriction) -> Self {
        self.access = access;
        self.modification = modification;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn password(&self) -> Vec<u8> {
        self.state.lock().unwrap().password.clone()
    }

    /// The raw password, for a peer that already holds it out-of-band and
    /// needs to compute its own side of the challenge/response (§4.10:
    /// the slave mirrors the master's token computation).
    pub fn password_for_auth(&self) -> Vec<u8> {
        self.password()
    }

    /// §4.10: `Account.deriveKey(len, salt)` — HKDF over the stored
    /// password, tagged for `engine_id`.
    pub fn derive_key(&self, len: usize, salt: &[u8], engine_id: &'static str) -> Key {
        Key::derive(&self.password(), salt, len, engine_id)
    }

    /// Registers `listener` to fire (outside any lock) on every future
    /// password rotation.
    pub fn watch(self: &Arc<Self>, listener: impl Fn() + Send + Sync + 'static) -> WatchHandle {
        let mut state = self.state.lock().unwrap();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, Box::new(listener)));
        WatchHandle { account: self.clone(), id }
    }

    /// Rotates the password and fires every watcher.
    pub fn rotate_password(&self, new_password: Vec<u8>) {
        let listeners: Vec<u64> = {
            let mut state = self.state.lock().unwrap();
            state.password = new_password;
            state.listeners.iter().map(|(id, _)| *id).collect()
        };
        let state = self.state.lock().unwrap();
        for (id, listener) in &state.listeners {
            if listeners.contains(id) {
                listener();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn derive_key_is_stable_until_rotation() {
        let account = Account::new("alice", b"s3cret".to_vec());
        let k1 = account.derive_key(16, b"saltsaltsaltsalt", "aes-128-ctr");
        let k2 = account.derive_key(16, b"saltsaltsaltsalt", "aes-128-ctr");
        assert_eq!(k1.bytes(), k2.bytes());
        account.rotate_password(b"newpass".to_vec());
        let k3 = account.derive_key(16, b"saltsaltsaltsalt", "aes-128-ctr");
        assert_ne!(k1.bytes(), k3.bytes());
    }

    #[test]
    fn watch_fires_on_rotation_and_unwatch_stops_it() {
        let account = Arc::new(Account::new("bob", b"hunter2".to_vec()));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let handle = account.watch(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        account.rotate_password(b"next".to_vec());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        handle.unwatch();
        account.rotate_password(b"again".to_vec());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
