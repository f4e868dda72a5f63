//! Echo suppression and state fan-out.
//!
//! A state update pushed by the device is applied to the adapter's own
//! control surface, and the host notifies the adapter of that change
//! through the same entry point a user action would take. Without a
//! guard, the adapter would re-emit the update as a command and bounce
//! the value back to the device.

use std::collections::HashMap;

use crate::protocol::StateEvent;

/// Per-target "local echo in flight" flag.
///
/// The adapter engages the guard, performs its programmatic update (which
/// re-enters the value-changed handler synchronously), then releases.
/// Release must happen only after the re-entrant call has returned; all
/// host callbacks in this crate are synchronous trait calls, so
/// release-after-return is sufficient.
#[derive(Debug, Default)]
pub struct EchoGuard {
    engaged: bool,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&mut self) {
        self.engaged = true;
    }

    pub fn release(&mut self) {
        self.engaged = false;
    }

    /// True while a device-originated update is being applied locally.
    pub fn suppressed(&self) -> bool {
        self.engaged
    }
}

/// Receives decoded state events. Implemented by the client adapters.
pub trait StateListener {
    fn on_state(&mut self, event: &StateEvent);
}

/// Fans one decoded event out to every attached listener and keeps the
/// last device-reported level per pin. The cache is written only here,
/// on the inbound path — a command never updates it.
#[derive(Default)]
pub struct Synchronizer {
    listeners: Vec<Box<dyn StateListener + Send>>,
    levels: HashMap<String, u8>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, listener: Box<dyn StateListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn dispatch(&mut self, event: &StateEvent) {
        if let StateEvent::Light { pin, level } = event {
            self.levels.insert(pin.clone(), *level);
        }
        for listener in &mut self.listeners {
            listener.on_state(event);
        }
    }

    /// Last level the device reported for `pin`, if any.
    pub fn level(&self, pin: &str) -> Option<u8> {
        self.levels.get(pin).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_starts_clear() {
        let guard = EchoGuard::new();
        assert!(!guard.suppressed());
    }

    #[test]
    fn guard_suppresses_while_engaged() {
        let mut guard = EchoGuard::new();
        guard.engage();
        assert!(guard.suppressed());
        guard.release();
        assert!(!guard.suppressed());
    }

    struct Recorder {
        seen: std::sync::mpsc::Sender<StateEvent>,
    }

    impl StateListener for Recorder {
        fn on_state(&mut self, event: &StateEvent) {
            self.seen.send(event.clone()).unwrap();
        }
    }

    #[test]
    fn dispatch_reaches_every_listener_in_order() {
        let (tx_a, rx_a) = std::sync::mpsc::channel();
        let (tx_b, rx_b) = std::sync::mpsc::channel();
        let mut sync = Synchronizer::new();
        sync.attach(Box::new(Recorder { seen: tx_a }));
        sync.attach(Box::new(Recorder { seen: tx_b }));

        sync.dispatch(&StateEvent::Position(12));
        sync.dispatch(&StateEvent::Target(34));

        for rx in [rx_a, rx_b] {
            assert_eq!(rx.try_recv().unwrap(), StateEvent::Position(12));
            assert_eq!(rx.try_recv().unwrap(), StateEvent::Target(34));
        }
    }

    #[test]
    fn light_events_update_the_level_cache() {
        let mut sync = Synchronizer::new();
        assert_eq!(sync.level("a"), None);

        sync.dispatch(&StateEvent::Light {
            pin: "a".to_string(),
            level: 42,
        });
        assert_eq!(sync.level("a"), Some(42));

        sync.dispatch(&StateEvent::Light {
            pin: "a".to_string(),
            level: 0,
        });
        assert_eq!(sync.level("a"), Some(0));
    }
}
