//! Environment abstraction for deterministic testing.
//!
//! Ratchet logic never touches the system clock or the OS RNG directly. Both
//! come from an [`Environment`], so a simulation can replay a conversation
//! byte for byte from a seed.

/// Time and randomness available to the protocol.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `wall_clock_secs()` is seconds since the Unix epoch
pub trait Environment: Clone + Send + Sync + 'static {
    /// Wall-clock time in seconds since the Unix epoch.
    ///
    /// Used to timestamp cached skipped message keys so they can expire.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for device IDs.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Fixed-size random array, for keys and IVs.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn random_index(&self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.random_u64() % len as u64) as usize
    }
}
