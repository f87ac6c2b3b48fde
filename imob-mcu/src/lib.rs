//! I-Mob MCU Library
//!
//! Traits for the hardware the immobilizer firmware talks to.
//!
//! This crate provides:
//! - GATT server abstraction (publish values, drop the link)
//! - Block cipher oracle and hardware RNG pool
//! - Analog inputs, accelerometer and factory device id
//! - Relay driver outputs
//! - A `Board` trait bundling one implementation of each
//!
//! # Implementations
//! - Host simulator: see `imob-sim`
//!
//! # Note
//! No logic lives here apart from write validation. The state machines are
//! in `imob-core`.

pub mod ble;
pub mod board;
pub mod crypto;
pub mod relay;
pub mod sensors;

pub use ble::*;
pub use board::*;
pub use crypto::*;
pub use relay::*;
pub use sensors::*;
