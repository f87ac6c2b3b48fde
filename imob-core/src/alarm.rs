//! Theft alarm flag
//!
//! Raised by the sensor gate. An authenticated peer may set it explicitly;
//! any other write to the device counts as the peer acknowledging it and
//! clears it.

use crate::publish::publish;
use crate::session::Session;
use imob_mcu::{validate_write, GattServer};
use imob_proto::Attribute;
use log::*;

#[derive(Debug, Default)]
pub struct Alarm {
    state: u8,
}

impl Alarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn raise<G: GattServer>(&mut self, gatt: &mut G) {
        if self.state == 0 {
            warn!("[ALARM] Alarm raised");
        }
        self.set(1, gatt);
    }

    pub fn on_data_written<G: GattServer>(
        &mut self,
        attribute: Attribute,
        data: &[u8],
        session: &Session,
        gatt: &mut G,
    ) {
        let accepted = attribute == Attribute::AlarmState
            && session.is_authenticated()
            && validate_write(attribute, data).is_ok();

        if accepted {
            self.set(data[0], gatt);
        } else {
            if self.state != 0 {
                info!("[ALARM] Cleared by peer write to {}", attribute);
            }
            self.set(0, gatt);
        }
    }

    /// Publishes only when the value changes
    fn set<G: GattServer>(&mut self, value: u8, gatt: &mut G) {
        if value != self.state {
            self.state = value;
            publish(gatt, Attribute::AlarmState, &[value]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGatt;

    fn authenticated() -> Session {
        let mut session = Session::new();
        session.set_authenticated(true);
        session
    }

    #[test]
    fn raise_publishes_once() {
        let mut alarm = Alarm::new();
        let mut gatt = MockGatt::default();
        alarm.raise(&mut gatt);
        alarm.raise(&mut gatt);
        assert_eq!(alarm.state(), 1);
        assert_eq!(gatt.history().len(), 1);
        assert_eq!(gatt.value(Attribute::AlarmState), Some(vec![1]));
    }

    #[test]
    fn other_writes_acknowledge() {
        let mut alarm = Alarm::new();
        let mut gatt = MockGatt::default();
        alarm.raise(&mut gatt);
        alarm.on_data_written(Attribute::Nonce, &[0; 16], &Session::new(), &mut gatt);
        assert_eq!(alarm.state(), 0);
        assert_eq!(gatt.value(Attribute::AlarmState), Some(vec![0]));
    }

    #[test]
    fn authenticated_peer_sets_value() {
        let mut alarm = Alarm::new();
        let mut gatt = MockGatt::default();
        alarm.on_data_written(Attribute::AlarmState, &[3], &authenticated(), &mut gatt);
        assert_eq!(alarm.state(), 3);
    }

    #[test]
    fn unauthenticated_alarm_write_clears() {
        let mut alarm = Alarm::new();
        let mut gatt = MockGatt::default();
        alarm.raise(&mut gatt);
        alarm.on_data_written(Attribute::AlarmState, &[1], &Session::new(), &mut gatt);
        assert_eq!(alarm.state(), 0);

        alarm.raise(&mut gatt);
        alarm.on_data_written(Attribute::AlarmState, &[1, 1], &authenticated(), &mut gatt);
        assert_eq!(alarm.state(), 0);
    }
}
