//! `Random` — uniform byte source, abstracted so tests can swap in a seeded
//! `SmallRng` (§3: "Random yields uniform bytes").

use rand::RngCore;

pub trait Random: Send + Sync {
    fn fill(&self, buf: &mut [u8]);

    fn bytes(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf);
        buf
    }
}

/// `rand::thread_rng` backed source, the default outside tests.
#[derive(Debug, Default)]
pub struct OsRandom;

impl Random for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf);
    }
}

#[cfg(test)]
pub(crate) struct SeededRandom(pub std::sync::Mutex<rand::rngs::SmallRng>);

#[cfg(test)]
impl Random for SeededRandom {
    fn fill(&self, buf: &mut [u8]) {
        self.0.lock().unwrap().fill_bytes(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_random_fills_requested_length() {
        let random = OsRandom;
        let buf = random.bytes(24);
        assert_eq!(buf.len(), 24);
    }
}
