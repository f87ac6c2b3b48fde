//! Motion detection and the round-robin analog sensor gate

use crate::config::Config;
use crate::publish::{publish, publish_flag};
use crate::session::Session;
use imob_mcu::{Accelerometer, AnalogChannel, GattServer};
use imob_proto::Attribute;
use log::*;

/// Flags any axis moving by more than `threshold` between two samples
pub struct MotionDetector<A> {
    accel: A,
    threshold: i32,
    last: Option<[i16; 3]>,
}

impl<A: Accelerometer> MotionDetector<A> {
    pub fn new(accel: A, threshold: i32) -> Self {
        Self { accel, threshold, last: None }
    }

    /// Take a sample and publish whether it moved. The first sample only
    /// sets the baseline.
    pub fn sample<G: GattServer>(&mut self, gatt: &mut G) -> bool {
        let current = self.accel.read();
        let moved = match self.last {
            Some(previous) => previous
                .iter()
                .zip(current.iter())
                .any(|(p, c)| (i32::from(*c) - i32::from(*p)).abs() > self.threshold),
            None => false,
        };
        self.last = Some(current);

        if moved {
            debug!("[SENSOR] Motion detected {:?}", current);
        }
        publish_flag(gatt, Attribute::MotionDetected, moved);
        moved
    }
}

/// Lipo charger status line, bucketed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerState {
    Discharging,
    Charging,
    /// Trickle charge or unplugged
    Trickle,
}

impl ChargerState {
    pub fn classify(reading: f32, low: f32, high: f32) -> Self {
        if reading > high {
            ChargerState::Charging
        } else if reading > low {
            ChargerState::Trickle
        } else {
            ChargerState::Discharging
        }
    }

    /// Wire value of the charger-state attribute
    pub fn as_byte(self) -> u8 {
        match self {
            ChargerState::Discharging => 0,
            ChargerState::Charging => 1,
            ChargerState::Trickle => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Battery,
    Charger,
    Contact,
}

impl Channel {
    fn following(self) -> Self {
        match self {
            Channel::Battery => Channel::Charger,
            Channel::Charger => Channel::Contact,
            Channel::Contact => Channel::Battery,
        }
    }
}

/// What the caller has to act on after a sensor tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SensorOutcome {
    pub motion: bool,
    pub raise_alarm: bool,
    /// Ignition switched on while armed and unauthenticated
    pub contact_intrusion: bool,
}

pub struct SensorGate<A> {
    battery: A,
    charger: A,
    contact: A,
    next: Channel,
    charger_low: f32,
    charger_high: f32,
    contact_threshold: f32,
    battery_scale: f32,
    calibrated: bool,
    battery_level: u8,
    charger_state: ChargerState,
    contact_on: bool,
    charge_cycles: u32,
    discharge_cycles: u32,
}

impl<A: AnalogChannel> SensorGate<A> {
    pub fn new(battery: A, charger: A, contact: A, config: &Config) -> Self {
        Self {
            battery,
            charger,
            contact,
            next: Channel::Battery,
            charger_low: config.charger_low_threshold,
            charger_high: config.charger_high_threshold,
            contact_threshold: config.contact_threshold,
            battery_scale: config.battery_scale,
            calibrated: false,
            battery_level: 0,
            charger_state: ChargerState::Trickle,
            contact_on: false,
            charge_cycles: 0,
            discharge_cycles: 0,
        }
    }

    /// Sample the next channel in turn, then advance the cycle counters
    pub fn tick<G: GattServer>(
        &mut self,
        session: &Session,
        motion: bool,
        gatt: &mut G,
    ) -> SensorOutcome {
        let mut outcome = SensorOutcome { motion, ..Default::default() };

        match self.next {
            Channel::Battery => self.sample_battery(gatt),
            Channel::Charger => outcome.raise_alarm = self.sample_charger(session, motion, gatt),
            Channel::Contact => outcome.contact_intrusion = self.sample_contact(session, gatt),
        }
        self.next = self.next.following();

        match self.charger_state {
            ChargerState::Discharging => self.charge_cycles = self.charge_cycles.wrapping_add(1),
            ChargerState::Charging => self.discharge_cycles = self.discharge_cycles.wrapping_add(1),
            ChargerState::Trickle => {}
        }

        outcome
    }

    pub fn battery_level(&self) -> u8 {
        self.battery_level
    }

    pub fn battery_scale(&self) -> f32 {
        self.battery_scale
    }

    pub fn charger_state(&self) -> ChargerState {
        self.charger_state
    }

    pub fn contact_on(&self) -> bool {
        self.contact_on
    }

    pub fn charge_cycles(&self) -> u32 {
        self.charge_cycles
    }

    pub fn discharge_cycles(&self) -> u32 {
        self.discharge_cycles
    }

    fn sample_battery<G: GattServer>(&mut self, gatt: &mut G) {
        let reading = self.battery.read();
        // `as` saturates: negative readings land on 0
        self.battery_level = (reading * self.battery_scale).min(255.0) as u8;
        publish(gatt, Attribute::BatteryLevel, &[self.battery_level]);
    }

    fn sample_charger<G: GattServer>(
        &mut self,
        session: &Session,
        motion: bool,
        gatt: &mut G,
    ) -> bool {
        let state =
            ChargerState::classify(self.charger.read(), self.charger_low, self.charger_high);
        let previous = self.charger_state;

        match (previous, state) {
            (ChargerState::Discharging, ChargerState::Charging) => {
                publish(gatt, Attribute::ChargeCycles, &self.charge_cycles.to_be_bytes());
                self.charge_cycles = 0;
            }
            (ChargerState::Charging, ChargerState::Discharging) => {
                publish(gatt, Attribute::DischargeCycles, &self.discharge_cycles.to_be_bytes());
                self.discharge_cycles = 0;
            }
            _ => {}
        }

        if state == ChargerState::Charging && !self.calibrated && self.battery_level != 0 {
            self.battery_scale *= 100.0 / f32::from(self.battery_level);
            self.calibrated = true;
            info!("[SENSOR] Battery scale calibrated to {:.2}", self.battery_scale);
        }

        if state != previous {
            debug!("[SENSOR] Charger {:?} -> {:?}", previous, state);
        }
        self.charger_state = state;
        publish(gatt, Attribute::ChargerState, &[state.as_byte()]);

        state == ChargerState::Trickle && session.is_activated() && motion
    }

    fn sample_contact<G: GattServer>(&mut self, session: &Session, gatt: &mut G) -> bool {
        self.contact_on = self.contact.read() > self.contact_threshold;
        publish_flag(gatt, Attribute::ContactState, self.contact_on);

        let intrusion = self.contact_on && session.is_activated() && !session.is_authenticated();
        if intrusion {
            warn!("[SENSOR] Ignition on while armed and unauthenticated");
        }
        intrusion
    }
}
