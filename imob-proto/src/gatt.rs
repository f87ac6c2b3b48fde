//! GATT service and characteristic table for the I-Mob immobilizer
//!
//! All services use 16-bit UUIDs on the Bluetooth base UUID. The battery
//! service is the standard SIG one.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Bluetooth base UUID: 00000000-0000-1000-8000-00805f9b34fb
pub const BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expand a 16-bit SIG-style UUID onto the Bluetooth base UUID
pub const fn expand_uuid16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

/// Service UUIDs
pub mod services {
    pub const IMOB_STATE: u16 = 0xA000;
    pub const INTERNAL_VALUES: u16 = 0xB000;
    pub const RELAY: u16 = 0xC000;
    pub const ACCEL_SENSOR: u16 = 0xD000;
    pub const ALARM: u16 = 0xE000;
    pub const BATTERY: u16 = 0x180F;

    /// Advertised service list, in advertising order
    pub const ADVERTISED: [u16; 6] =
        [IMOB_STATE, RELAY, ALARM, INTERNAL_VALUES, ACCEL_SENSOR, BATTERY];
}

/// Access rules of a characteristic as seen by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Access {
    const R: Access = Access { read: true, write: false, notify: false };
    const W: Access = Access { read: false, write: true, notify: false };
    const RN: Access = Access { read: true, write: false, notify: true };
    const RW: Access = Access { read: true, write: true, notify: false };
    const RWN: Access = Access { read: true, write: true, notify: true };
}

/// Every characteristic the device exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Candidate passphrase (peer -> device)
    Pass,
    /// Nonce: written by the peer to request a fresh one, published by the device
    Nonce,
    /// Whether a fresh nonce has been issued on this link
    NonceUpdated,
    /// Authentication result
    Authentication,
    /// Armed flag
    Activation,
    /// Lipo charger classification
    ChargerState,
    /// Ignition contact classification
    ContactState,
    /// First device-id word
    Id1,
    /// Second device-id word
    Id2,
    /// Ticks spent discharging before the last charge started
    ChargeCycles,
    /// Ticks spent charging before the last discharge started
    DischargeCycles,
    /// Relay engaged flag, a peer write requests actuation
    RelayState,
    /// Motion detected on the last tick
    MotionDetected,
    /// Alarm raised
    AlarmState,
    /// Battery level, 0-100
    BatteryLevel,
}

impl Attribute {
    pub const ALL: [Attribute; 15] = [
        Attribute::Pass,
        Attribute::Nonce,
        Attribute::NonceUpdated,
        Attribute::Authentication,
        Attribute::Activation,
        Attribute::ChargerState,
        Attribute::ContactState,
        Attribute::Id1,
        Attribute::Id2,
        Attribute::ChargeCycles,
        Attribute::DischargeCycles,
        Attribute::RelayState,
        Attribute::MotionDetected,
        Attribute::AlarmState,
        Attribute::BatteryLevel,
    ];

    /// 16-bit characteristic UUID
    pub const fn uuid16(self) -> u16 {
        match self {
            Attribute::Pass => 0xA001,
            Attribute::Nonce => 0xA002,
            Attribute::NonceUpdated => 0xA003,
            Attribute::Authentication => 0xA004,
            Attribute::Activation => 0xA005,
            Attribute::ChargerState => 0xB001,
            Attribute::ContactState => 0xB002,
            Attribute::Id1 => 0xB003,
            Attribute::Id2 => 0xB004,
            Attribute::ChargeCycles => 0xB005,
            Attribute::DischargeCycles => 0xB006,
            Attribute::RelayState => 0xC001,
            Attribute::MotionDetected => 0xD001,
            Attribute::AlarmState => 0xE001,
            Attribute::BatteryLevel => 0x2A19,
        }
    }

    /// Full 128-bit characteristic UUID
    pub const fn uuid(self) -> Uuid {
        expand_uuid16(self.uuid16())
    }

    /// 16-bit UUID of the owning service
    pub const fn service(self) -> u16 {
        match self {
            Attribute::Pass
            | Attribute::Nonce
            | Attribute::NonceUpdated
            | Attribute::Authentication
            | Attribute::Activation => services::IMOB_STATE,
            Attribute::ChargerState
            | Attribute::ContactState
            | Attribute::Id1
            | Attribute::Id2
            | Attribute::ChargeCycles
            | Attribute::DischargeCycles => services::INTERNAL_VALUES,
            Attribute::RelayState => services::RELAY,
            Attribute::MotionDetected => services::ACCEL_SENSOR,
            Attribute::AlarmState => services::ALARM,
            Attribute::BatteryLevel => services::BATTERY,
        }
    }

    /// Value length in bytes; writes of any other length are dropped
    pub const fn value_len(self) -> usize {
        match self {
            Attribute::Pass | Attribute::Nonce => 16,
            Attribute::Id1
            | Attribute::Id2
            | Attribute::ChargeCycles
            | Attribute::DischargeCycles => 4,
            _ => 1,
        }
    }

    pub const fn access(self) -> Access {
        match self {
            Attribute::Pass | Attribute::Nonce => Access::W,
            Attribute::NonceUpdated | Attribute::Authentication => Access::R,
            Attribute::Activation => Access::RW,
            Attribute::ChargerState | Attribute::ContactState | Attribute::MotionDetected => {
                Access::RN
            }
            Attribute::Id1
            | Attribute::Id2
            | Attribute::ChargeCycles
            | Attribute::DischargeCycles => Access::R,
            Attribute::RelayState | Attribute::AlarmState => Access::RWN,
            Attribute::BatteryLevel => Access::RN,
        }
    }

    /// Look up a characteristic by its 16-bit UUID
    pub fn from_uuid16(uuid: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.uuid16() == uuid)
    }

    /// Look up a characteristic by its full UUID
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.uuid() == *uuid)
    }

    /// Short lowercase name, used in logs and simulator scripts
    pub const fn name(self) -> &'static str {
        match self {
            Attribute::Pass => "pass",
            Attribute::Nonce => "nonce",
            Attribute::NonceUpdated => "nonce-updated",
            Attribute::Authentication => "authentication",
            Attribute::Activation => "activation",
            Attribute::ChargerState => "charger",
            Attribute::ContactState => "contact",
            Attribute::Id1 => "id1",
            Attribute::Id2 => "id2",
            Attribute::ChargeCycles => "charge-cycles",
            Attribute::DischargeCycles => "discharge-cycles",
            Attribute::RelayState => "relay",
            Attribute::MotionDetected => "motion",
            Attribute::AlarmState => "alarm",
            Attribute::BatteryLevel => "battery",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown attribute: {0}")]
pub struct UnknownAttribute(pub String);

impl FromStr for Attribute {
    type Err = UnknownAttribute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownAttribute(s.to_string()))
    }
}
