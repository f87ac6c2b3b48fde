//! Relay Output Traits

/// Outputs driving the latching relay
///
/// The pulse line powers the relay driver for the duration of a sequence;
/// the relay line selects the contact position.
pub trait RelayDriver {
    /// Drive the pulse-control line (12 V switch on the reference board)
    fn set_pulse_line(&mut self, high: bool);

    /// Drive the relay coil line
    fn set_relay(&mut self, engaged: bool);
}
