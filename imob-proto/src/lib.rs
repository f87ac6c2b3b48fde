//! I-Mob wire protocol - GATT services, characteristics and buffer sizes
//!
//! The immobilizer exposes its state as BLE GATT characteristics. This crate
//! only defines the shape of that surface: UUIDs, value sizes and who may
//! write what. The firmware core and the simulator both build on it.

pub mod gatt;

pub use gatt::*;

/// Advertised device name
pub const DEVICE_NAME: &str = "I-Mob";

/// Length of the passphrase written by the peer
pub const PASS_LEN: usize = 16;

/// Length of the nonce buffer (counter + random part)
pub const NONCE_LEN: usize = 16;

/// Length of the AES-128 key used for the counter-mode keystream
pub const KEY_LEN: usize = 16;

/// Length of a BLE hardware address
pub const MAC_LEN: usize = 6;

/// Leading bytes of the nonce reserved for the block counter
pub const COUNTER_LEN: usize = 4;

/// Trailing bytes of the nonce filled from the RNG
pub const NONCE_RAND_LEN: usize = NONCE_LEN - COUNTER_LEN;

/// A 16-byte block as consumed by the cipher and the pass/nonce attributes
pub type Block = [u8; 16];

/// BLE hardware address of a peer
pub type PeerAddress = [u8; MAC_LEN];

/// Format a peer address the usual colon-separated way (most significant byte first)
pub fn format_address(addr: &PeerAddress) -> String {
    addr.iter()
        .rev()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse a colon-separated peer address (most significant byte first)
pub fn parse_address(s: &str) -> Option<PeerAddress> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != MAC_LEN {
        return None;
    }

    let mut addr = [0u8; MAC_LEN];
    for (i, part) in parts.iter().rev().enumerate() {
        addr[i] = u8::from_str_radix(part, 16).ok()?;
    }
    Some(addr)
}
