//! `CredentialMaster` — the account registry (§4.10: "owns `Map<name,
//! Account>` and a default (empty-name) account").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::crypto::random::Random;
use crate::error::AuthError;

use super::account::Account;

pub struct CredentialMaster {
    accounts: Mutex<HashMap<String, Arc<Account>>>,
    default_account: Arc<Account>,
    random: Arc<dyn Random>,
}

impl CredentialMaster {
    pub fn new(random: Arc<dyn Random>) -> Self {
        CredentialMaster {
            accounts: Mutex::new(HashMap::new()),
            default_account: Arc::new(Account::new("", Vec::new())),
            random,
        }
    }

    pub fn default_account(&self) -> Arc<Account> {
        self.default_account.clone()
    }

    /// Creates `name` with a freshly randomised password — §4.10:
    /// "randomised at birth via the master's cipher over `seed:identifier`".
    /// The cipher step is the caller's `Random`; we draw raw entropy the
    /// same width a derived key would need.
    pub fn create_account(&self, name: impl Into<String>) -> Result<Arc<Account>, AuthError> {
        let name = name.into();
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&name) {
            return Err(AuthError::UnknownAccount(format!("'{name}' already exists")));
        }
        let password = self.random.bytes(32);
        let account = Arc::new(Account::new(name.clone(), password));
        accounts.insert(name, account.clone());
        Ok(account)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Account>> {
        if name.is_empty() {
            return Some(self.default_account.clone());
        }
        self.accounts.lock().unwrap().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Account>> {
        self.accounts.lock().unwrap().remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::OsRandom;

    #[test]
    fn create_then_lookup_round_trips() {
        let master = CredentialMaster::new(Arc::new(OsRandom));
        let account = master.create_account("alice").unwrap();
        assert_eq!(master.get("alice").unwrap().name(), account.name());
    }

    #[test]
    fn duplicate_create_fails() {
        let master = CredentialMaster::new(Arc::new(OsRandom));
        master.create_account("alice").unwrap();
        assert!(master.create_account("alice").is_err());
    }

    #[test]
    fn empty_name_resolves_to_default_account() {
        let master = CredentialMaster::new(Arc::new(OsRandom));
        assert_eq!(master.get("").unwrap().name(), "");
    }
}
