//! Board trait bundling one implementation of every collaborator

use crate::{
    Accelerometer, AnalogChannel, BlockCipher, Delay, DeviceIdentity, GattServer, RandomSource,
    RelayDriver,
};

/// A concrete hardware (or simulated) board
///
/// The firmware core is generic over one `Board`, so each platform names its
/// collaborator types once.
pub trait Board {
    type Gatt: GattServer;
    type Cipher: BlockCipher;
    type Rng: RandomSource;
    type Delay: Delay;
    type Relay: RelayDriver;
    type Accel: Accelerometer;
    type Analog: AnalogChannel;
    type Identity: DeviceIdentity;
}

/// Owned instances of a board's collaborators, handed to the firmware at boot
pub struct Peripherals<B: Board> {
    pub gatt: B::Gatt,
    pub cipher: B::Cipher,
    pub rng: B::Rng,
    pub delay: B::Delay,
    pub relay: B::Relay,
    pub accel: B::Accel,
    /// Battery voltage divider
    pub battery: B::Analog,
    /// Lipo charger status pin
    pub charger: B::Analog,
    /// Ignition contact sense
    pub contact: B::Analog,
    pub identity: B::Identity,
}
