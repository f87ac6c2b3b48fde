//! In-memory collaborators for unit tests
//!
//! Inputs use shared handles (`Rc<Cell<_>>`) so a test can keep driving a
//! sensor after the firmware has taken ownership of it.

use imob_mcu::{
    Accelerometer, AnalogChannel, Attribute, BlockCipher, Board, Delay, DeviceIdentity,
    GattServer, Peripherals, RandomSource, RelayDriver,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct MockGatt {
    values: HashMap<Attribute, Vec<u8>>,
    history: Vec<(Attribute, Vec<u8>)>,
    disconnects: usize,
}

impl MockGatt {
    pub fn value(&self, attribute: Attribute) -> Option<Vec<u8>> {
        self.values.get(&attribute).cloned()
    }

    pub fn history(&self) -> &[(Attribute, Vec<u8>)] {
        &self.history
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects
    }
}

impl GattServer for MockGatt {
    type Error = Infallible;

    fn write(&mut self, attribute: Attribute, value: &[u8]) -> Result<(), Self::Error> {
        self.values.insert(attribute, value.to_vec());
        self.history.push((attribute, value.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnects += 1;
        Ok(())
    }
}

/// Deterministic stand-in for the AES block oracle
#[derive(Debug, Default)]
pub struct MockCipher {
    failing: Rc<Cell<bool>>,
}

impl MockCipher {
    pub fn failure_switch(&self) -> Rc<Cell<bool>> {
        self.failing.clone()
    }
}

impl BlockCipher for MockCipher {
    type Error = &'static str;

    fn encrypt_block(&mut self, key: &[u8; 16], block: &[u8; 16]) -> Result<[u8; 16], Self::Error> {
        if self.failing.get() {
            return Err("ecb busy");
        }
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = block[i].wrapping_mul(0x9D)
                ^ block[(i + 1) % 16].rotate_left(1)
                ^ key[i]
                ^ 0x5C;
        }
        Ok(out)
    }
}

/// RNG pool that hands out at most `cap` bytes per poll
#[derive(Debug)]
pub struct MockRng {
    state: u32,
    cap: usize,
    starved: usize,
    broken: bool,
    polls: Rc<Cell<usize>>,
}

impl MockRng {
    pub fn new(seed: u8, cap: usize) -> Self {
        Self {
            state: u32::from(seed).wrapping_mul(2_654_435_761) | 1,
            cap,
            starved: 0,
            broken: false,
            polls: Rc::default(),
        }
    }

    /// Report an empty pool for the first `polls` polls
    pub fn starved_for(mut self, polls: usize) -> Self {
        self.starved = polls;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn polls(&self) -> Rc<Cell<usize>> {
        self.polls.clone()
    }
}

impl RandomSource for MockRng {
    type Error = &'static str;

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        self.polls.set(self.polls.get() + 1);
        if self.broken {
            return Err("rng fault");
        }
        if self.starved > 0 {
            self.starved -= 1;
            return Ok(0);
        }
        Ok(self.cap)
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), Self::Error> {
        if self.broken {
            return Err("rng fault");
        }
        for byte in dest {
            self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            *byte = (self.state >> 16) as u8;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockDelay {
    total_us: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn total_us(&self) -> Rc<Cell<u64>> {
        self.total_us.clone()
    }
}

impl Delay for MockDelay {
    fn delay_us(&mut self, micros: u32) {
        self.total_us.set(self.total_us.get() + u64::from(micros));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayLine {
    Pulse(bool),
    Relay(bool),
}

/// Records every output change
#[derive(Debug, Default)]
pub struct MockRelay {
    lines: Rc<RefCell<Vec<RelayLine>>>,
}

impl MockRelay {
    pub fn lines(&self) -> Rc<RefCell<Vec<RelayLine>>> {
        self.lines.clone()
    }
}

impl RelayDriver for MockRelay {
    fn set_pulse_line(&mut self, high: bool) {
        self.lines.borrow_mut().push(RelayLine::Pulse(high));
    }

    fn set_relay(&mut self, engaged: bool) {
        self.lines.borrow_mut().push(RelayLine::Relay(engaged));
    }
}

#[derive(Debug, Clone)]
pub struct MockAnalog(Rc<Cell<f32>>);

impl MockAnalog {
    pub fn new(value: f32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn set(&self, value: f32) {
        self.0.set(value);
    }
}

impl AnalogChannel for MockAnalog {
    fn read(&mut self) -> f32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockAccel(Rc<Cell<[i16; 3]>>);

impl MockAccel {
    pub fn set(&self, sample: [i16; 3]) {
        self.0.set(sample);
    }
}

impl Accelerometer for MockAccel {
    fn read(&mut self) -> [i16; 3] {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct MockIdentity(pub [u32; 2]);

impl DeviceIdentity for MockIdentity {
    fn device_id(&self) -> [u32; 2] {
        self.0
    }
}

pub struct MockBoard;

impl Board for MockBoard {
    type Gatt = MockGatt;
    type Cipher = MockCipher;
    type Rng = MockRng;
    type Delay = MockDelay;
    type Relay = MockRelay;
    type Accel = MockAccel;
    type Analog = MockAnalog;
    type Identity = MockIdentity;
}

/// Test-side handles onto a `MockBoard`'s inputs and outputs
pub struct Handles {
    pub accel: MockAccel,
    pub battery: MockAnalog,
    pub charger: MockAnalog,
    pub contact: MockAnalog,
    pub relay_lines: Rc<RefCell<Vec<RelayLine>>>,
}

/// A board reading half battery, trickle charge, ignition off, no motion
pub fn mock_peripherals(device_id: [u32; 2]) -> (Peripherals<MockBoard>, Handles) {
    let relay = MockRelay::default();
    let handles = Handles {
        accel: MockAccel::default(),
        battery: MockAnalog::new(0.5),
        charger: MockAnalog::new(0.5),
        contact: MockAnalog::new(0.0),
        relay_lines: relay.lines(),
    };
    let peripherals = Peripherals {
        gatt: MockGatt::default(),
        cipher: MockCipher::default(),
        rng: MockRng::new(7, 5),
        delay: MockDelay::default(),
        relay,
        accel: handles.accel.clone(),
        battery: handles.battery.clone(),
        charger: handles.charger.clone(),
        contact: handles.contact.clone(),
        identity: MockIdentity(device_id),
    };
    (peripherals, handles)
}
