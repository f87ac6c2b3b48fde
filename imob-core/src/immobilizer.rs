//! Firmware top level: owns the session and every state machine, and routes
//! link events and ticks between them

use crate::alarm::Alarm;
use crate::auth::{AuthState, Authenticator};
use crate::cipher::CtrCipher;
use crate::config::Config;
use crate::credential::derive_secrets;
use crate::error::ConfigError;
use crate::nonce::NonceAuthority;
use crate::publish::publish;
use crate::relay::{RelayPhase, RelaySequencer};
use crate::sensors::{ChargerState, MotionDetector, SensorGate};
use crate::session::Session;
use crate::watchdog::Watchdog;
use crate::Millis;
use imob_mcu::{validate_write, Board, DeviceIdentity, GattServer, LinkEvent, Peripherals};
use imob_proto::{format_address, Attribute, PeerAddress};
use log::*;

pub struct Immobilizer<B: Board> {
    config: Config,
    session: Session,
    gatt: B::Gatt,
    auth: Authenticator<B::Cipher, B::Rng, B::Delay>,
    relay: RelaySequencer<B::Relay>,
    watchdog: Watchdog,
    motion: MotionDetector<B::Accel>,
    sensors: SensorGate<B::Analog>,
    alarm: Alarm,
    device_id: [u32; 2],
}

impl<B: Board> Immobilizer<B> {
    /// Boot: derive the device secrets, publish the identity and put every
    /// attribute in its reset state
    pub fn new(config: Config, peripherals: Peripherals<B>) -> Result<Self, ConfigError> {
        config.validate()?;

        let Peripherals {
            gatt,
            cipher,
            rng,
            delay,
            relay,
            accel,
            battery,
            charger,
            contact,
            identity,
        } = peripherals;

        let device_id = identity.device_id();
        let (credential, key) = derive_secrets(device_id);

        let mut imob = Self {
            session: Session::new(),
            gatt,
            auth: Authenticator::new(
                CtrCipher::new(cipher),
                NonceAuthority::new(rng, delay, config.rng_byte_wait_us),
                credential,
                key,
            ),
            relay: RelaySequencer::new(relay, config.relay_pulse_ms, config.relay_block_ms),
            watchdog: Watchdog::new(config.disconnect_ticks(), config.auto_arm_ticks()),
            motion: MotionDetector::new(accel, config.motion_threshold),
            sensors: SensorGate::new(battery, charger, contact, &config),
            alarm: Alarm::new(),
            device_id,
            config,
        };
        imob.publish_boot_values();

        info!("[BOOT] I-Mob ready, device id {:08X}{:08X}", device_id[0], device_id[1]);
        Ok(imob)
    }

    fn publish_boot_values(&mut self) {
        publish(&mut self.gatt, Attribute::Id1, &self.device_id[0].to_be_bytes());
        publish(&mut self.gatt, Attribute::Id2, &self.device_id[1].to_be_bytes());
        publish(&mut self.gatt, Attribute::Nonce, self.auth.nonce());
        publish(&mut self.gatt, Attribute::NonceUpdated, &[0]);
        publish(&mut self.gatt, Attribute::RelayState, &[0]);
        publish(&mut self.gatt, Attribute::AlarmState, &[0]);
        publish(&mut self.gatt, Attribute::ChargerState, &[ChargerState::Trickle.as_byte()]);
        publish(&mut self.gatt, Attribute::ChargeCycles, &0u32.to_be_bytes());
        publish(&mut self.gatt, Attribute::DischargeCycles, &0u32.to_be_bytes());
        self.auth.reset_authentication_values(&mut self.session, &mut self.gatt);
        self.auth.update_activation_value(false, &mut self.session, &mut self.gatt);
    }

    pub fn handle(&mut self, event: LinkEvent, now: Millis) {
        match event {
            LinkEvent::Connected(peer) => self.on_connect(peer),
            LinkEvent::Disconnected => self.on_disconnect(now),
            LinkEvent::DataWritten { attribute, data } => {
                self.on_data_written(attribute, &data, now)
            }
        }
    }

    pub fn on_connect(&mut self, peer: PeerAddress) {
        info!("[BLE] Connected: {}", format_address(&peer));
        self.auth.on_connect(peer, &mut self.session, &mut self.gatt);
    }

    /// Leaving while authenticated and armed cuts the ignition. The check
    /// has to see the session before the authenticator resets it.
    pub fn on_disconnect(&mut self, now: Millis) {
        info!("[BLE] Disconnected");
        if self.session.is_authenticated() && self.session.is_activated() {
            info!("[RELAY] Owner left an armed device, actuating");
            self.relay.activate(now);
        }
        self.auth.on_disconnect(&mut self.session, &mut self.gatt);
    }

    pub fn on_data_written(&mut self, attribute: Attribute, data: &[u8], now: Millis) {
        debug!("[BLE] Write {} ({} bytes)", attribute, data.len());

        self.auth.on_data_written(attribute, data, &mut self.session, &mut self.gatt);

        if attribute == Attribute::RelayState {
            self.on_relay_write(data, now);
        }

        self.alarm.on_data_written(attribute, data, &self.session, &mut self.gatt);
    }

    /// An authenticated actuation request also ends the session and arms the
    /// device, so the next ignition attempt needs a fresh authentication.
    fn on_relay_write(&mut self, data: &[u8], now: Millis) {
        if let Err(reason) = validate_write(Attribute::RelayState, data) {
            debug!("[RELAY] Dropped relay write: {}", reason);
            return;
        }
        if !self.session.is_authenticated() {
            debug!("[RELAY] Dropped relay write: not authenticated");
            return;
        }

        self.relay.activate(now);
        self.auth.reset_authentication_values(&mut self.session, &mut self.gatt);
        if !self.session.is_activated() {
            self.auth.update_activation_value(true, &mut self.session, &mut self.gatt);
        }
    }

    /// One main-loop tick: relay timers, motion, one analog channel, watchdogs
    pub fn tick(&mut self, now: Millis) {
        self.poll_timers(now);

        let motion = self.motion.sample(&mut self.gatt);
        let outcome = self.sensors.tick(&self.session, motion, &mut self.gatt);
        if outcome.raise_alarm {
            self.alarm.raise(&mut self.gatt);
        }
        if outcome.contact_intrusion {
            self.relay.activate(now);
        }

        let watchdog = self.watchdog.tick(&self.session);
        if watchdog.force_disconnect {
            warn!("[WATCHDOG] Peer did not authenticate in time, disconnecting");
            if let Err(e) = self.gatt.disconnect() {
                warn!("[WATCHDOG] Disconnect failed: {:?}", e);
            }
        }
        if watchdog.auto_arm {
            info!("[WATCHDOG] Nobody configured the device, arming");
            self.auth.update_activation_value(true, &mut self.session, &mut self.gatt);
            self.session.latch_initial_activation();
        }
    }

    /// Advance the relay sequence to `now`
    pub fn poll_timers(&mut self, now: Millis) {
        self.relay.poll(now, &mut self.gatt);
    }

    /// Earliest pending relay transition
    pub fn next_deadline(&self) -> Option<Millis> {
        self.relay.next_deadline()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.state(&self.session)
    }

    pub fn relay_phase(&self) -> RelayPhase {
        self.relay.phase()
    }

    pub fn alarm_state(&self) -> u8 {
        self.alarm.state()
    }

    pub fn sensors(&self) -> &SensorGate<B::Analog> {
        &self.sensors
    }

    pub fn device_id(&self) -> [u32; 2] {
        self.device_id
    }

    pub fn gatt(&self) -> &B::Gatt {
        &self.gatt
    }

    pub fn gatt_mut(&mut self) -> &mut B::Gatt {
        &mut self.gatt
    }
}
