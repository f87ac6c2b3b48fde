//! Per-device passphrase and cipher key
//!
//! Both are tiled from the factory device id at boot and never stored
//! anywhere else.

use imob_proto::{Block, KEY_LEN, PASS_LEN};
use std::fmt;

/// The passphrase a peer must present to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct Credential([u8; PASS_LEN]);

/// Key for the counter-mode keystream
#[derive(Clone, PartialEq, Eq)]
pub struct CryptoKey([u8; KEY_LEN]);

impl Credential {
    pub fn from_bytes(bytes: [u8; PASS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PASS_LEN] {
        &self.0
    }

    /// Byte-exact comparison against a candidate pass
    pub fn matches(&self, candidate: &Block) -> bool {
        self.0 == *candidate
    }
}

impl CryptoKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CryptoKey(..)")
    }
}

/// Derive the device passphrase and cipher key from the two device-id words
///
/// Each word is serialized big-endian. The pass is word 1 tiled over the first
/// half and word 2 tiled over the second half; the key is word 2 tiled over
/// all 16 bytes.
pub fn derive_secrets(device_id: [u32; 2]) -> (Credential, CryptoKey) {
    let id1 = device_id[0].to_be_bytes();
    let id2 = device_id[1].to_be_bytes();

    let mut pass = [0u8; PASS_LEN];
    for (i, byte) in pass.iter_mut().enumerate() {
        *byte = if i < PASS_LEN / 2 { id1[i % 4] } else { id2[i % 4] };
    }

    let mut key = [0u8; KEY_LEN];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = id2[i % 4];
    }

    (Credential(pass), CryptoKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiling_layout() {
        let (pass, key) = derive_secrets([0x0102_0304, 0xA1B2_C3D4]);
        assert_eq!(
            pass.as_bytes(),
            &[1, 2, 3, 4, 1, 2, 3, 4, 0xA1, 0xB2, 0xC3, 0xD4, 0xA1, 0xB2, 0xC3, 0xD4]
        );
        assert_eq!(key.as_bytes()[..4], [0xA1, 0xB2, 0xC3, 0xD4]);
        assert_eq!(key.as_bytes()[12..], [0xA1, 0xB2, 0xC3, 0xD4]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let id = [0xDEAD_BEEF, 0x1234_5678];
        assert_eq!(derive_secrets(id), derive_secrets(id));
    }

    #[test]
    fn distinct_devices_get_distinct_secrets() {
        let (pass_a, key_a) = derive_secrets([0xDEAD_BEEF, 0x1234_5678]);
        let (pass_b, key_b) = derive_secrets([0xDEAD_BEEF, 0x8765_4321]);
        assert_ne!(pass_a, pass_b);
        assert_ne!(key_a, key_b);

        let (pass_c, _) = derive_secrets([0x0BAD_F00D, 0x1234_5678]);
        assert_ne!(pass_a, pass_c);
    }

    #[test]
    fn debug_does_not_leak() {
        let (pass, key) = derive_secrets([1, 2]);
        assert_eq!(format!("{:?}", pass), "Credential(..)");
        assert_eq!(format!("{:?}", key), "CryptoKey(..)");
    }
}
