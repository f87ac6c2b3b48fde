//! I-Mob Immobilizer Firmware Core
//!
//! Platform-independent firmware for a BLE vehicle immobilizer. A paired
//! controller authenticates with a nonce-based challenge/response; once
//! authenticated it can arm the device or request a relay cut-off. Watchdogs
//! drop unauthenticated links and auto-arm an abandoned device, and the
//! sensor gate turns ignition and motion events into relay actuations and
//! alarms.
//!
//! # Example
//!
//! ```ignore
//! use imob_core::{Config, Immobilizer};
//!
//! let mut imob = Immobilizer::<MyBoard>::new(Config::default(), peripherals)?;
//!
//! loop {
//!     let now = clock.millis();
//!     imob.poll_timers(now);
//!     if let Some(event) = ble.next_event() {
//!         imob.handle(event, now);
//!     }
//!     if tick_elapsed {
//!         imob.tick(now);
//!     }
//! }
//! ```
//!
//! Everything runs on one thread. Handlers run to completion and never block,
//! except for the short RNG back-off while generating a nonce.

pub mod alarm;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod credential;
pub mod error;
pub mod immobilizer;
pub mod nonce;
pub mod relay;
pub mod sensors;
pub mod session;
pub mod watchdog;

mod publish;

#[cfg(test)]
mod testing;

pub use alarm::Alarm;
pub use auth::{AuthState, Authenticator};
pub use cipher::CtrCipher;
pub use config::Config;
pub use credential::{derive_secrets, Credential, CryptoKey};
pub use error::{CipherError, ConfigError, NonceError};
pub use immobilizer::Immobilizer;
pub use nonce::NonceAuthority;
pub use relay::{RelayPhase, RelaySequencer};
pub use sensors::{ChargerState, MotionDetector, SensorGate, SensorOutcome};
pub use session::Session;
pub use watchdog::{Watchdog, WatchdogOutcome};

pub use imob_mcu::{LinkEvent, Peripherals};
pub use imob_proto::{Attribute, Block, PeerAddress};

/// Monotonic time in milliseconds since boot
pub type Millis = u64;
