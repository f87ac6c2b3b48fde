//! Host implementation of the board collaborators
//!
//! AES comes from the `aes` crate, random bytes from the OS. Analog inputs
//! and the accelerometer are plain values the script sets.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use data_encoding::HEXUPPER;
use imob_mcu::{
    Accelerometer, AnalogChannel, Attribute, BlockCipher, Board, Delay, DeviceIdentity,
    GattServer, Peripherals, RandomSource, RelayDriver,
};
use log::*;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::cell::Cell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum GattError {
    #[error("{attribute} holds {expected} bytes, got {got}")]
    WrongLength {
        attribute: Attribute,
        expected: usize,
        got: usize,
    },
    #[error("no peer connected")]
    NotConnected,
}

/// Attribute table kept in memory. Notifications go to the log.
#[derive(Debug, Default)]
pub struct SimGatt {
    values: HashMap<Attribute, Vec<u8>>,
    connected: bool,
    disconnect_requested: bool,
}

impl SimGatt {
    pub fn value(&self, attribute: Attribute) -> Option<&[u8]> {
        self.values.get(&attribute).map(Vec::as_slice)
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// A disconnect the firmware asked for, to be delivered back as a link event
    pub fn take_disconnect_request(&mut self) -> bool {
        std::mem::take(&mut self.disconnect_requested)
    }
}

impl GattServer for SimGatt {
    type Error = GattError;

    fn write(&mut self, attribute: Attribute, value: &[u8]) -> Result<(), Self::Error> {
        if value.len() != attribute.value_len() {
            return Err(GattError::WrongLength {
                attribute,
                expected: attribute.value_len(),
                got: value.len(),
            });
        }

        let changed = self.value(attribute) != Some(value);
        if changed && self.connected && attribute.access().notify {
            info!("[GATT] notify {} = {}", attribute, HEXUPPER.encode(value));
        } else {
            trace!("[GATT] {} = {}", attribute, HEXUPPER.encode(value));
        }
        self.values.insert(attribute, value.to_vec());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(GattError::NotConnected);
        }
        self.disconnect_requested = true;
        Ok(())
    }
}

/// AES-128 single-block oracle
#[derive(Debug, Default)]
pub struct AesOracle;

impl BlockCipher for AesOracle {
    type Error = Infallible;

    fn encrypt_block(&mut self, key: &[u8; 16], block: &[u8; 16]) -> Result<[u8; 16], Self::Error> {
        let cipher = Aes128::new(GenericArray::from_slice(key));
        let mut buf = GenericArray::clone_from_slice(block);
        cipher.encrypt_block(&mut buf);

        let mut out = [0u8; 16];
        out.copy_from_slice(&buf);
        Ok(out)
    }
}

/// OS randomness behind a pool that, like the nRF RNG, only has a few bytes
/// ready at any moment
#[derive(Debug)]
pub struct PoolRng {
    per_poll: usize,
}

impl PoolRng {
    pub fn new(per_poll: usize) -> Self {
        Self { per_poll }
    }
}

impl RandomSource for PoolRng {
    type Error = rand::Error;

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        Ok(OsRng.gen_range(0..=self.per_poll))
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), Self::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

#[derive(Debug, Default)]
pub struct HostDelay;

impl Delay for HostDelay {
    fn delay_us(&mut self, micros: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(micros)));
    }
}

/// Relay outputs, logged
#[derive(Debug, Default)]
pub struct LoggedRelay;

impl RelayDriver for LoggedRelay {
    fn set_pulse_line(&mut self, high: bool) {
        info!("[GPIO] pulse line {}", if high { "high" } else { "low" });
    }

    fn set_relay(&mut self, engaged: bool) {
        info!("[GPIO] relay {}", if engaged { "engaged" } else { "released" });
    }
}

#[derive(Debug, Clone)]
pub struct SimAnalog(Rc<Cell<f32>>);

impl SimAnalog {
    pub fn new(value: f32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn set(&self, value: f32) {
        self.0.set(value);
    }
}

impl AnalogChannel for SimAnalog {
    fn read(&mut self) -> f32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimAccel(Rc<Cell<[i16; 3]>>);

impl SimAccel {
    pub fn set(&self, sample: [i16; 3]) {
        self.0.set(sample);
    }
}

impl Accelerometer for SimAccel {
    fn read(&mut self) -> [i16; 3] {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct FixedIdentity(pub [u32; 2]);

impl DeviceIdentity for FixedIdentity {
    fn device_id(&self) -> [u32; 2] {
        self.0
    }
}

pub struct SimBoard;

impl Board for SimBoard {
    type Gatt = SimGatt;
    type Cipher = AesOracle;
    type Rng = PoolRng;
    type Delay = HostDelay;
    type Relay = LoggedRelay;
    type Accel = SimAccel;
    type Analog = SimAnalog;
    type Identity = FixedIdentity;
}

/// Handles the script uses to drive the simulated inputs
#[derive(Debug, Clone)]
pub struct SimInputs {
    pub battery: SimAnalog,
    pub charger: SimAnalog,
    pub contact: SimAnalog,
    pub accel: SimAccel,
}

/// Bytes the simulated RNG pool has ready per poll (at most)
const RNG_BYTES_PER_POLL: usize = 4;

/// A board on the bench: full battery, charger unplugged, ignition off
pub fn sim_peripherals(device_id: [u32; 2]) -> (Peripherals<SimBoard>, SimInputs) {
    let inputs = SimInputs {
        battery: SimAnalog::new(0.9),
        charger: SimAnalog::new(0.5),
        contact: SimAnalog::new(0.0),
        accel: SimAccel::default(),
    };

    let peripherals = Peripherals {
        gatt: SimGatt::default(),
        cipher: AesOracle,
        rng: PoolRng::new(RNG_BYTES_PER_POLL),
        delay: HostDelay,
        relay: LoggedRelay,
        accel: inputs.accel.clone(),
        battery: inputs.battery.clone(),
        charger: inputs.charger.clone(),
        contact: inputs.contact.clone(),
        identity: FixedIdentity(device_id),
    };
    (peripherals, inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_oracle_matches_fips197() {
        // FIPS-197 appendix C.1
        let key: [u8; 16] = std::array::from_fn(|i| i as u8);
        let plain: [u8; 16] = std::array::from_fn(|i| i as u8 * 0x11);
        let out = AesOracle.encrypt_block(&key, &plain).unwrap();
        assert_eq!(HEXUPPER.encode(&out), "69C4E0D86A7B0430D8CDB78070B4C55A");
    }

    #[test]
    fn gatt_rejects_wrong_length() {
        let mut gatt = SimGatt::default();
        assert!(matches!(
            gatt.write(Attribute::Pass, &[0; 4]),
            Err(GattError::WrongLength { expected: 16, got: 4, .. })
        ));
        gatt.write(Attribute::BatteryLevel, &[42]).unwrap();
        assert_eq!(gatt.value(Attribute::BatteryLevel), Some(&[42u8][..]));
    }

    #[test]
    fn disconnect_is_queued() {
        let mut gatt = SimGatt::default();
        assert!(gatt.disconnect().is_err());
        gatt.set_connected(true);
        gatt.disconnect().unwrap();
        assert!(gatt.take_disconnect_request());
        assert!(!gatt.take_disconnect_request());
    }
}
