//! Production Environment implementation using system time and RNG.

use crate::env::Environment;

/// Production environment using the system clock and getrandom.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness.
/// Suitable for identity keys, pre-keys, ratchet keys and body keys.
///
/// # Panics
///
/// Panics if the OS RNG fails. A device without functioning cryptographic
/// randomness cannot generate keys safely, so there is nothing to fall back
/// to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys cannot be generated");
    }
}
