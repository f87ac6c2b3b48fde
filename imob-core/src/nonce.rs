//! Nonce generation from the hardware RNG pool

use crate::error::NonceError;
use imob_mcu::{Delay, RandomSource};
use imob_proto::{Block, COUNTER_LEN, NONCE_RAND_LEN};
use log::*;

pub struct NonceAuthority<R, D> {
    rng: R,
    delay: D,
    byte_wait_us: u32,
}

impl<R: RandomSource, D: Delay> NonceAuthority<R, D> {
    pub fn new(rng: R, delay: D, byte_wait_us: u32) -> Self {
        Self { rng, delay, byte_wait_us }
    }

    /// Fill `buf[4..16]` with random bytes. `buf[0..4]` is left for the
    /// caller's counter seed.
    ///
    /// The pool may not hold enough bytes yet, so this busy-waits, backing off
    /// by the typical per-byte RNG latency for each byte still missing. It only
    /// returns early if the RNG itself reports an error.
    pub fn generate(&mut self, buf: &mut Block) -> Result<(), NonceError> {
        let mut filled = COUNTER_LEN;
        let mut remaining = NONCE_RAND_LEN;

        while remaining != 0 {
            let available = self
                .rng
                .bytes_available()
                .map_err(|e| NonceError::Source(format!("{:?}", e)))?
                .min(remaining);

            if available != 0 {
                self.rng
                    .fill(&mut buf[filled..filled + available])
                    .map_err(|e| NonceError::Source(format!("{:?}", e)))?;
                filled += available;
                remaining -= available;
            }

            if remaining != 0 {
                trace!("RNG pool short, waiting for {} bytes", remaining);
                self.delay.delay_us(self.byte_wait_us.saturating_mul(remaining as u32));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDelay, MockRng};

    #[test]
    fn fills_random_part_only() {
        let mut authority = NonceAuthority::new(MockRng::new(1, 16), MockDelay::default(), 124);
        let mut buf = [0xEE; 16];
        authority.generate(&mut buf).unwrap();
        assert_eq!(buf[..4], [0xEE; 4]);
        assert_ne!(buf[4..], [0xEE; 12]);
    }

    #[test]
    fn waits_for_a_slow_pool() {
        // Pool hands out at most 5 bytes per poll: 5 + 5 + 2
        let delay = MockDelay::default();
        let waited = delay.total_us();
        let rng = MockRng::new(1, 5);
        let polls = rng.polls();
        let mut authority = NonceAuthority::new(rng, delay, 124);

        let mut buf = [0u8; 16];
        authority.generate(&mut buf).unwrap();

        assert_eq!(polls.get(), 3);
        assert_eq!(waited.get(), 124 * 7 + 124 * 2);
    }

    #[test]
    fn empty_pool_backs_off_until_refilled() {
        let delay = MockDelay::default();
        let waited = delay.total_us();
        let rng = MockRng::new(1, 12).starved_for(2);
        let mut authority = NonceAuthority::new(rng, delay, 100);

        let mut buf = [0u8; 16];
        authority.generate(&mut buf).unwrap();
        assert_eq!(waited.get(), 2 * 12 * 100);
    }

    #[test]
    fn consecutive_nonces_differ() {
        let mut authority = NonceAuthority::new(MockRng::new(9, 16), MockDelay::default(), 124);
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        authority.generate(&mut a).unwrap();
        authority.generate(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn source_error_is_reported() {
        let mut authority =
            NonceAuthority::new(MockRng::new(1, 16).broken(), MockDelay::default(), 124);
        let mut buf = [0u8; 16];
        assert!(matches!(authority.generate(&mut buf), Err(NonceError::Source(_))));
    }

    #[test]
    fn long_back_off_saturates() {
        let delay = MockDelay::default();
        let waited = delay.total_us();
        let rng = MockRng::new(1, 12).starved_for(1);
        let mut authority = NonceAuthority::new(rng, delay, 1_000_000_000);

        let mut buf = [0u8; 16];
        authority.generate(&mut buf).unwrap();
        assert_eq!(waited.get(), u64::from(u32::MAX));
    }
}
