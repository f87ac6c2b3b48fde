//! Tick-counting watchdogs
//!
//! Each counter only runs while its guard holds and drops back to zero as
//! soon as the guard is false. A counter that has gone past its threshold
//! fires on the following tick and restarts from zero.

use crate::session::Session;

/// What the caller has to do after a tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogOutcome {
    /// Drop the link to an unauthenticated peer
    pub force_disconnect: bool,
    /// Arm a device nobody has configured since boot
    pub auto_arm: bool,
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    disconnect_ticks: u32,
    auto_arm_ticks: u32,
    disconnect_counter: u32,
    auto_arm_counter: u32,
}

impl Watchdog {
    pub fn new(disconnect_ticks: u32, auto_arm_ticks: u32) -> Self {
        Self {
            disconnect_ticks,
            auto_arm_ticks,
            disconnect_counter: 0,
            auto_arm_counter: 0,
        }
    }

    pub fn tick(&mut self, session: &Session) -> WatchdogOutcome {
        let force_disconnect = step(
            &mut self.disconnect_counter,
            self.disconnect_ticks,
            !session.is_authenticated() && session.is_user_connected(),
        );
        let auto_arm = step(
            &mut self.auto_arm_counter,
            self.auto_arm_ticks,
            !session.initial_activation() && !session.is_user_connected(),
        );

        WatchdogOutcome { force_disconnect, auto_arm }
    }

    pub fn disconnect_counter(&self) -> u32 {
        self.disconnect_counter
    }

    pub fn auto_arm_counter(&self) -> u32 {
        self.auto_arm_counter
    }
}

fn step(counter: &mut u32, threshold: u32, guard: bool) -> bool {
    if !guard {
        *counter = 0;
        return false;
    }
    if *counter > threshold {
        *counter = 0;
        true
    } else {
        *counter += 1;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> Session {
        let mut session = Session::new();
        session.set_user_connected(true);
        session
    }

    /// Ticks until the first time `fired` returns true
    fn ticks_until(
        watchdog: &mut Watchdog,
        session: &Session,
        fired: fn(&WatchdogOutcome) -> bool,
    ) -> u32 {
        (1..10_000)
            .find(|_| fired(&watchdog.tick(session)))
            .unwrap()
    }

    #[test]
    fn disconnect_fires_once_then_restarts() {
        let mut watchdog = Watchdog::new(125, 312);
        let session = connected();

        let first = ticks_until(&mut watchdog, &session, |o| o.force_disconnect);
        assert_eq!(first, 127);
        assert_eq!(watchdog.disconnect_counter(), 0);

        let next = watchdog.tick(&session);
        assert!(!next.force_disconnect);
        assert_eq!(watchdog.disconnect_counter(), 1);
    }

    #[test]
    fn authenticating_in_time_prevents_disconnect() {
        let mut watchdog = Watchdog::new(125, 312);
        let mut session = connected();

        for _ in 0..100 {
            assert!(!watchdog.tick(&session).force_disconnect);
        }
        session.set_authenticated(true);
        for _ in 0..1_000 {
            assert!(!watchdog.tick(&session).force_disconnect);
        }
        assert_eq!(watchdog.disconnect_counter(), 0);
    }

    #[test]
    fn auto_arm_only_while_nobody_connected() {
        let mut watchdog = Watchdog::new(125, 312);
        let mut session = Session::new();

        for _ in 0..200 {
            watchdog.tick(&session);
        }
        assert_eq!(watchdog.auto_arm_counter(), 200);

        // A connection resets the count
        session.set_user_connected(true);
        watchdog.tick(&session);
        assert_eq!(watchdog.auto_arm_counter(), 0);

        session.set_user_connected(false);
        let fired_at = ticks_until(&mut watchdog, &session, |o| o.auto_arm);
        assert_eq!(fired_at, 314);
    }

    #[test]
    fn no_auto_arm_after_initial_activation() {
        let mut watchdog = Watchdog::new(125, 312);
        let mut session = Session::new();
        session.latch_initial_activation();
        for _ in 0..1_000 {
            assert!(!watchdog.tick(&session).auto_arm);
        }
    }
}
