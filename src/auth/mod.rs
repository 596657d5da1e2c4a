//! Credential / authentication subsystem (§3, §4.10): accounts, their
//! restriction lists, and the challenge/response handshake that binds a
//! net connection to one.

pub mod account;
pub mod authenticator;
pub mod credential_master;
pub mod restriction;

pub use account::{Account, WatchHandle};
pub use authenticator::{MasterAuthenticator, SlaveAuthenticator, CHALLENGE_SIZE};
pub use credential_master::CredentialMaster;
pub use restriction::NamedRestriction;
