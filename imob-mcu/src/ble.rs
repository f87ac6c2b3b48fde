//! BLE GATT types and traits for the I-Mob immobilizer
//!
//! Attribute table and UUIDs are in imob_proto.
//! This module provides the link events and the server trait the core publishes through.

// Re-export protocol types for convenience
pub use imob_proto::{services, Attribute, PeerAddress, DEVICE_NAME};

/// Event delivered by the BLE stack to the firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A peer connected
    Connected(PeerAddress),
    /// The peer disconnected (either side terminated)
    Disconnected,
    /// The peer wrote a characteristic
    DataWritten { attribute: Attribute, data: Vec<u8> },
}

/// Trait for BLE GATT server implementations
///
/// Platform crates implement this trait using their BLE stack.
pub trait GattServer {
    /// Error type for GATT operations
    type Error: core::fmt::Debug;

    /// Update a characteristic value, notifying the peer where the characteristic allows it
    fn write(&mut self, attribute: Attribute, value: &[u8]) -> Result<(), Self::Error>;

    /// Terminate the current link (local host terminated connection)
    fn disconnect(&mut self) -> Result<(), Self::Error>;
}

/// Validates a peer write against the attribute table
///
/// Returns error message if the write must be dropped. Dropped writes are
/// never reported back to the peer.
pub fn validate_write(attribute: Attribute, data: &[u8]) -> Result<(), &'static str> {
    if !attribute.access().write {
        return Err("attribute is not writable");
    }
    if data.len() != attribute.value_len() {
        return Err("wrong value length");
    }
    Ok(())
}
