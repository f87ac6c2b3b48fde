//! Process-wide authentication and arming flags
//!
//! One `Session` lives for the whole run. It is owned by the `Immobilizer`
//! and lent to each state machine for the duration of a handler; the setters
//! are crate-private so only the firmware's own state machines mutate it.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
    activated: bool,
    user_connected: bool,
    initial_activation: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid pass has been presented against the current nonce
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Armed: an unauthenticated ignition event triggers the relay
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_user_connected(&self) -> bool {
        self.user_connected
    }

    /// Latched once the device has been armed or a peer authenticated since boot
    pub fn initial_activation(&self) -> bool {
        self.initial_activation
    }

    pub(crate) fn set_authenticated(&mut self, value: bool) {
        self.authenticated = value;
    }

    pub(crate) fn set_activated(&mut self, value: bool) {
        self.activated = value;
    }

    pub(crate) fn set_user_connected(&mut self, value: bool) {
        self.user_connected = value;
    }

    pub(crate) fn latch_initial_activation(&mut self) {
        self.initial_activation = true;
    }
}
