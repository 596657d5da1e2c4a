//! Error types for the editor core.
//!
//! Kept in the register `diamond-types` uses for its own parse errors
//! (`src/encoding/parseerror.rs`): a plain `#[non_exhaustive]` enum with a
//! hand-written `Display`, no `thiserror`/`anyhow` in the library crates.

use std::fmt::{self, Display, Formatter};

/// Errors raised by the text store and transaction layer (§7: `InvalidPosition`,
/// and the document-local subset of `Closed`).
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum SlokedError {
    /// A transaction or cursor referred to coordinates outside the document.
    InvalidPosition,
    /// Operation attempted on a block/stream/lifetime that is no longer open.
    Closed,
    /// A named lookup (service path, chunk line) found nothing.
    NotFound,
    /// Rollback/redo attempted on an empty stack.
    NothingToRollback,
    Other(String),
}

impl Display for SlokedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SlokedError::InvalidPosition => write!(f, "SlokedError: invalid position"),
            SlokedError::Closed => write!(f, "SlokedError: operation on closed object"),
            SlokedError::NotFound => write!(f, "SlokedError: not found"),
            SlokedError::NothingToRollback => write!(f, "SlokedError: nothing to rollback"),
            SlokedError::Other(msg) => write!(f, "SlokedError: {msg}"),
        }
    }
}

impl std::error::Error for SlokedError {}

/// Errors raised by the framed crypto socket and RPC fabric (§7: `InvalidFrame`,
/// `Timeout`, `UnknownService`, `NameExists`, `Closed`, `IOError`).
#[derive(Debug)]
#[non_exhaustive]
pub enum NetError {
    /// Frame type byte exceeds `KeyChange`, a truncated frame, or a CRC
    /// mismatch between the decoded payload and its checksum field.
    InvalidFrame,
    UnknownService(String),
    NameExists(String),
    Closed,
    Timeout,
    Cancelled,
    Io(std::io::Error),
    /// Opaque per §7: "the caller sees 'crypto failure' without details".
    CryptoFailure,
    Protocol(String),
}

impl Display for NetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NetError::InvalidFrame => write!(f, "NetError: invalid frame"),
            NetError::UnknownService(path) => write!(f, "NetError: unknown service '{path}'"),
            NetError::NameExists(path) => write!(f, "NetError: name '{path}' already registered"),
            NetError::Closed => write!(f, "NetError: operation on closed socket/pipe"),
            NetError::Timeout => write!(f, "NetError: RPC timed out"),
            NetError::Cancelled => write!(f, "NetError: cancelled"),
            NetError::Io(e) => write!(f, "NetError: I/O error: {e}"),
            NetError::CryptoFailure => write!(f, "NetError: crypto failure"),
            NetError::Protocol(msg) => write!(f, "NetError: protocol error: {msg}"),
        }
    }
}

impl std::error::Error for NetError {}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        NetError::Io(e)
    }
}

/// `std::io::Error` has no meaningful equality, so two `Io` variants
/// compare equal only by discriminant — enough for tests asserting
/// "this decode call failed", not for distinguishing which I/O error.
impl PartialEq for NetError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NetError::InvalidFrame, NetError::InvalidFrame) => true,
            (NetError::UnknownService(a), NetError::UnknownService(b)) => a == b,
            (NetError::NameExists(a), NetError::NameExists(b)) => a == b,
            (NetError::Closed, NetError::Closed) => true,
            (NetError::Timeout, NetError::Timeout) => true,
            (NetError::Cancelled, NetError::Cancelled) => true,
            (NetError::Io(_), NetError::Io(_)) => true,
            (NetError::CryptoFailure, NetError::CryptoFailure) => true,
            (NetError::Protocol(a), NetError::Protocol(b)) => a == b,
            _ => false,
        }
    }
}

/// `std::io::Error` isn't `Clone`, so `Io` degrades to a formatted
/// `Protocol` string here. Clones only ever feed secondary `TaskResult`
/// listeners fanning out an already-delivered error, never the original.
impl Clone for NetError {
    fn clone(&self) -> Self {
        match self {
            NetError::InvalidFrame => NetError::InvalidFrame,
            NetError::UnknownService(s) => NetError::UnknownService(s.clone()),
            NetError::NameExists(s) => NetError::NameExists(s.clone()),
            NetError::Closed => NetError::Closed,
            NetError::Timeout => NetError::Timeout,
            NetError::Cancelled => NetError::Cancelled,
            NetError::Io(e) => NetError::Protocol(format!("io error: {e}")),
            NetError::CryptoFailure => NetError::CryptoFailure,
            NetError::Protocol(s) => NetError::Protocol(s.clone()),
        }
    }
}

/// Errors raised by the credential/authentication subsystem (§7:
/// `NotAuthenticated`, `Restricted`).
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum AuthError {
    NotAuthenticated,
    Restricted(String),
    UnknownAccount(String),
    /// The active cipher's block size is smaller than the challenge, so no
    /// token can be derived (`Authenticator::GenerateToken`'s guard).
    UnsupportedCipher,
    LoginNotInitiated,
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotAuthenticated => write!(f, "AuthError: not authenticated"),
            AuthError::Restricted(path) => write!(f, "AuthError: access to '{path}' is restricted"),
            AuthError::UnknownAccount(name) => write!(f, "AuthError: account '{name}' is not available"),
            AuthError::UnsupportedCipher => {
                write!(f, "AuthError: authentication not supported for the current cipher")
            }
            AuthError::LoginNotInitiated => write!(f, "AuthError: login was not initiated"),
        }
    }
}

impl std::error::Error for AuthError {}
