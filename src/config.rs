//! `EditorConfig` — the scalar tunables a host would otherwise source from a
//! config file or CLI flags (§1: config loading is OUT OF SCOPE; this is
//! plain data, not a parser).
//!
//! Mirrors the register `dt-cli` uses for its own `clap` defaults
//! (`#[arg(default_value_t = ...)]`): named constants backing a `Default`
//! impl, no parsing logic in the core library.

use std::time::Duration;

/// Chunks above this size are split into separate `TextBlockHandle`s by
/// `TextView::Open` (§4.1).
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// §4.9: "InactivityThreshold (e.g., 60 s) forces disconnect".
pub const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(60);

/// §4.9: "a ping sent after InactivityTimeout (e.g., 5 s idle)".
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// §5: "socket RPC calls wait at most ResponseTimeout".
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Salt length fed into the KDF when deriving a session key (§4.10).
pub const DEFAULT_KDF_SALT_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Threshold above which `TextView::Open` emits a new lazy handle
    /// rather than growing the current chunk (§4.1).
    pub max_chunk_size: usize,
    /// §4.9 net-server ping/disconnect timers.
    pub inactivity_timeout: Duration,
    pub inactivity_threshold: Duration,
    /// §5: upper bound on a blocking RPC call.
    pub response_timeout: Duration,
    /// Bytes of salt generated per KDF call (§4.10).
    pub kdf_salt_len: usize,
}

impl Default for EditorConfig {
    fn default() -> EditorConfig {
        EditorConfig {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            kdf_salt_len: DEFAULT_KDF_SALT_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_positive() {
        let config = EditorConfig::default();
        assert!(config.max_chunk_size > 0);
        assert!(config.response_timeout > Duration::ZERO);
    }
}
