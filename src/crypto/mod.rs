//! Crypto abstraction (§3, §4.8): key derivation, the cipher engine, a
//! uniform random source, and the framed socket built on top of them.

pub mod cipher;
pub mod frame;
pub mod key;
pub mod random;
pub mod socket;

pub use cipher::{AesCtr128, Cipher, AES_CTR_128_ENGINE_ID};
pub use frame::{FrameType, NetFrame};
pub use key::Key;
pub use random::{OsRandom, Random};
pub use socket::CryptoSocket;
