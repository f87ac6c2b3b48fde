//! Crypto Primitive Traits
//!
//! The firmware does not implement AES itself. The platform supplies a
//! single-block encryption oracle (the ECB peripheral on nRF parts) and a
//! hardware RNG whose pool refills slowly.

/// Single-block AES-128 encryption oracle
pub trait BlockCipher {
    /// Error type for cipher operations (peripheral busy, stack not enabled, ...)
    type Error: core::fmt::Debug;

    /// Encrypt one 16-byte block with the given key
    fn encrypt_block(&mut self, key: &[u8; 16], block: &[u8; 16]) -> Result<[u8; 16], Self::Error>;
}

/// Hardware random number pool
///
/// The pool may hold fewer bytes than requested; callers poll
/// `bytes_available` and back off until enough entropy has accumulated.
pub trait RandomSource {
    /// Error type for RNG operations
    type Error: core::fmt::Debug;

    /// Number of random bytes currently in the pool
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Take `dest.len()` bytes from the pool. Must not be called with more
    /// than `bytes_available` bytes.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), Self::Error>;
}

/// Blocking microsecond delay
pub trait Delay {
    fn delay_us(&mut self, micros: u32);
}
