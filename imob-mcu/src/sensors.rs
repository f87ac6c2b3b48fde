//! Sensor Abstraction Traits
//!
//! Register-level drivers live in the platform crate. The core only sees
//! normalized samples.

/// Analog input normalized to [0, 1]
pub trait AnalogChannel {
    fn read(&mut self) -> f32;
}

/// 3-axis accelerometer
pub trait Accelerometer {
    /// Latest raw sample (x, y, z), sign-extended 12-bit counts
    fn read(&mut self) -> [i16; 3];
}

/// Factory-programmed device identity
pub trait DeviceIdentity {
    /// The two 32-bit device-id words (FICR DEVICEID on nRF parts)
    fn device_id(&self) -> [u32; 2];
}
