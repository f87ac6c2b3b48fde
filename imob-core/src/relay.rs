//! Bistable relay actuation
//!
//! The relay latches, so it is driven by pulsing a separate control line
//! around each toggle:
//!
//! ```text
//! Idle --activate--> PulseSet --pulse--> Blocked --block--> PulseReset --pulse--> Idle
//! ```
//!
//! Once started, a sequence always runs to completion. `activate` calls made
//! while one is in flight are dropped.

use crate::publish::publish_flag;
use crate::Millis;
use imob_mcu::{GattServer, RelayDriver};
use imob_proto::Attribute;
use log::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Idle,
    /// Pulse line raised, relay about to engage
    PulseSet,
    /// Relay engaged
    Blocked,
    /// Relay released, pulse line about to drop
    PulseReset,
}

pub struct RelaySequencer<D> {
    driver: D,
    pulse_ms: Millis,
    block_ms: Millis,
    phase: RelayPhase,
    deadline: Option<Millis>,
    relay_state: bool,
}

impl<D: RelayDriver> RelaySequencer<D> {
    pub fn new(driver: D, pulse_ms: Millis, block_ms: Millis) -> Self {
        Self {
            driver,
            pulse_ms,
            block_ms,
            phase: RelayPhase::Idle,
            deadline: None,
            relay_state: false,
        }
    }

    /// Start a sequence. Returns false if one is already in flight.
    pub fn activate(&mut self, now: Millis) -> bool {
        if self.is_in_flight() {
            debug!("[RELAY] Activation dropped, sequence in {:?}", self.phase);
            return false;
        }

        info!("[RELAY] Actuation started");
        self.driver.set_pulse_line(true);
        self.schedule(RelayPhase::PulseSet, now.saturating_add(self.pulse_ms));
        true
    }

    /// Run every transition whose deadline is at or before `now`. Each next
    /// deadline is counted from the one that fired, so a late poll does not
    /// stretch the sequence.
    pub fn poll<G: GattServer>(&mut self, now: Millis, gatt: &mut G) {
        while let Some(due) = self.deadline.filter(|due| *due <= now) {
            match self.phase {
                RelayPhase::PulseSet => {
                    self.set_relay(true, gatt);
                    self.schedule(RelayPhase::Blocked, due.saturating_add(self.block_ms));
                }
                RelayPhase::Blocked => {
                    self.set_relay(false, gatt);
                    self.schedule(RelayPhase::PulseReset, due.saturating_add(self.pulse_ms));
                }
                RelayPhase::PulseReset => {
                    self.driver.set_pulse_line(false);
                    self.phase = RelayPhase::Idle;
                    self.deadline = None;
                    info!("[RELAY] Actuation complete");
                }
                RelayPhase::Idle => self.deadline = None,
            }
        }
    }

    /// When the next transition is due, if any
    pub fn next_deadline(&self) -> Option<Millis> {
        self.deadline
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase != RelayPhase::Idle
    }

    /// Value last published on the relay-state attribute
    pub fn relay_state(&self) -> bool {
        self.relay_state
    }

    fn schedule(&mut self, phase: RelayPhase, at: Millis) {
        trace!("[RELAY] {:?} -> {:?} due at {}ms", self.phase, phase, at);
        self.phase = phase;
        self.deadline = Some(at);
    }

    fn set_relay<G: GattServer>(&mut self, engaged: bool, gatt: &mut G) {
        info!("[RELAY] Relay {}", if engaged { "engaged" } else { "released" });
        self.relay_state = engaged;
        self.driver.set_relay(engaged);
        publish_flag(gatt, Attribute::RelayState, engaged);
    }
}
