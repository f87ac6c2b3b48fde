//! Counter-mode keystream on top of a single-block cipher oracle
//!
//! The counter block is `counter (4 bytes, little-endian) || nonce[4..16]`.
//! Each successful call encrypts the counter block with the stored key, XORs
//! the result into the caller's buffer and bumps the counter. Encryption and
//! decryption are the same operation; callers keep track of which direction
//! they are in and of counter alignment.

use crate::error::CipherError;
use imob_mcu::BlockCipher;
use imob_proto::{Block, COUNTER_LEN, KEY_LEN};

struct CtrState {
    key: [u8; KEY_LEN],
    counter_block: Block,
}

pub struct CtrCipher<C> {
    oracle: C,
    state: Option<CtrState>,
}

impl<C: BlockCipher> CtrCipher<C> {
    pub fn new(oracle: C) -> Self {
        Self { oracle, state: None }
    }

    /// Load a nonce and key, zeroing the counter. Only bytes 4..16 of the
    /// nonce are used. Replaces any previous nonce and key.
    pub fn init(&mut self, nonce: &Block, key: &[u8; KEY_LEN]) {
        let mut counter_block = [0u8; 16];
        counter_block[COUNTER_LEN..].copy_from_slice(&nonce[COUNTER_LEN..]);
        self.state = Some(CtrState { key: *key, counter_block });
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current counter value, `None` before init
    pub fn counter(&self) -> Option<u32> {
        self.state.as_ref().map(|s| {
            let mut bytes = [0u8; COUNTER_LEN];
            bytes.copy_from_slice(&s.counter_block[..COUNTER_LEN]);
            u32::from_le_bytes(bytes)
        })
    }

    pub fn encrypt(&mut self, buf: &mut Block) -> Result<(), CipherError> {
        self.apply_keystream(buf)
    }

    pub fn decrypt(&mut self, buf: &mut Block) -> Result<(), CipherError> {
        self.apply_keystream(buf)
    }

    /// On error neither `buf` nor the counter is touched
    fn apply_keystream(&mut self, buf: &mut Block) -> Result<(), CipherError> {
        let state = self.state.as_mut().ok_or(CipherError::NotInitialized)?;

        let keystream = self
            .oracle
            .encrypt_block(&state.key, &state.counter_block)
            .map_err(|e| CipherError::BackendUnavailable(format!("{:?}", e)))?;

        for (b, k) in buf.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }

        let mut bytes = [0u8; COUNTER_LEN];
        bytes.copy_from_slice(&state.counter_block[..COUNTER_LEN]);
        let next = u32::from_le_bytes(bytes).wrapping_add(1);
        state.counter_block[..COUNTER_LEN].copy_from_slice(&next.to_le_bytes());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCipher;

    const KEY: [u8; 16] = [7u8; 16];

    fn nonce() -> Block {
        let mut n = [0u8; 16];
        for (i, b) in n.iter_mut().enumerate() {
            *b = 0x40 + i as u8;
        }
        n
    }

    #[test]
    fn refuses_before_init() {
        let mut ctr = CtrCipher::new(MockCipher::default());
        let mut buf = [0xAA; 16];
        assert_eq!(ctr.encrypt(&mut buf), Err(CipherError::NotInitialized));
        assert_eq!(buf, [0xAA; 16]);
        assert_eq!(ctr.counter(), None);
    }

    #[test]
    fn counter_advances_per_block() {
        let mut ctr = CtrCipher::new(MockCipher::default());
        ctr.init(&nonce(), &KEY);
        assert_eq!(ctr.counter(), Some(0));

        let mut buf = [0u8; 16];
        ctr.encrypt(&mut buf).unwrap();
        ctr.encrypt(&mut buf).unwrap();
        assert_eq!(ctr.counter(), Some(2));
    }

    #[test]
    fn round_trip_needs_rewind() {
        let plain = *b"sixteen byte msg";

        let mut ctr = CtrCipher::new(MockCipher::default());
        ctr.init(&nonce(), &KEY);
        let mut buf = plain;
        ctr.encrypt(&mut buf).unwrap();
        assert_ne!(buf, plain);

        // Decrypting with the next counter value does not restore the text
        let mut advanced = buf;
        ctr.decrypt(&mut advanced).unwrap();
        assert_ne!(advanced, plain);

        // Re-init rewinds the counter to zero
        ctr.init(&nonce(), &KEY);
        ctr.decrypt(&mut buf).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn counter_bytes_of_nonce_are_ignored() {
        let plain = [0x11; 16];
        let mut other = nonce();
        other[..4].copy_from_slice(&[9, 9, 9, 9]);

        let mut a = CtrCipher::new(MockCipher::default());
        let mut b = CtrCipher::new(MockCipher::default());
        a.init(&nonce(), &KEY);
        b.init(&other, &KEY);

        let (mut x, mut y) = (plain, plain);
        a.encrypt(&mut x).unwrap();
        b.encrypt(&mut y).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn backend_failure_leaves_buffer_and_counter() {
        let oracle = MockCipher::default();
        let failing = oracle.failure_switch();
        let mut ctr = CtrCipher::new(oracle);
        ctr.init(&nonce(), &KEY);

        failing.set(true);
        let mut buf = [0x5A; 16];
        assert!(matches!(ctr.encrypt(&mut buf), Err(CipherError::BackendUnavailable(_))));
        assert_eq!(buf, [0x5A; 16]);
        assert_eq!(ctr.counter(), Some(0));

        failing.set(false);
        ctr.encrypt(&mut buf).unwrap();
        assert_eq!(ctr.counter(), Some(1));
    }
}
