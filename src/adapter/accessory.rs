//! Home-automation accessory adapter: one on/off + brightness pair per
//! named pin. The host framework calls the `*_changed` handlers when a
//! user sets a characteristic; device updates flow in through
//! [`StateListener`] and are pushed back to the host under the echo
//! guard so they are never re-emitted as commands.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{Command, StateEvent};
use crate::sync::{EchoGuard, StateListener};

/// The host-framework side of one accessory. Out of scope beyond this
/// surface: whatever renders the characteristics calls back into the
/// accessory through the `*_changed` handlers.
pub trait CharacteristicHost {
    fn update_power(&mut self, on: bool);
    fn update_brightness(&mut self, level: u8);
}

/// One dimmable light (or blind channel) bound to a device pin.
pub struct LightAccessory<H: CharacteristicHost> {
    pin: String,
    /// Last device-reported level. Never inferred from a command we
    /// sent; only an inbound frame moves it.
    level: Option<u8>,
    guard: EchoGuard,
    host: H,
    commands: mpsc::Sender<Command>,
}

impl<H: CharacteristicHost> LightAccessory<H> {
    pub fn new(pin: impl Into<String>, host: H, commands: mpsc::Sender<Command>) -> Self {
        Self {
            pin: pin.into(),
            level: None,
            guard: EchoGuard::new(),
            host,
            commands,
        }
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// On characteristic read: `None` until the device first reports.
    pub fn power(&self) -> Option<bool> {
        self.level.map(|v| v > 0)
    }

    /// Brightness characteristic read.
    pub fn brightness(&self) -> Option<u8> {
        self.level
    }

    /// Host set-handler for the On characteristic. `None` happens at
    /// initial characteristic load and must not produce a command.
    pub fn power_changed(&mut self, on: Option<bool>) {
        if self.guard.suppressed() {
            return;
        }
        let Some(on) = on else {
            return;
        };
        debug!("Host set power for pin {}: {}", self.pin, on);
        self.send(Command::Power {
            pin: self.pin.clone(),
            on,
        });
    }

    /// Host set-handler for the Brightness characteristic.
    pub fn brightness_changed(&mut self, level: Option<u8>) {
        if self.guard.suppressed() {
            return;
        }
        let Some(level) = level else {
            return;
        };
        debug!("Host set brightness for pin {}: {}", self.pin, level);
        self.send(Command::Set {
            pin: Some(self.pin.clone()),
            level,
        });
    }

    /// Apply a device-reported level: record it, push both
    /// characteristics to the host, and absorb the host's synchronous
    /// set-callbacks under the guard. The guard is released only after
    /// both re-entrant calls have returned.
    fn apply_remote(&mut self, level: u8) {
        self.level = Some(level);
        self.guard.engage();
        self.host.update_power(level > 0);
        self.power_changed(Some(level > 0));
        self.host.update_brightness(level);
        self.brightness_changed(Some(level));
        self.guard.release();
    }

    fn send(&self, cmd: Command) {
        if self.commands.try_send(cmd).is_err() {
            warn!("Dropping command for pin {}: channel full or closed", self.pin);
        }
    }
}

impl<H: CharacteristicHost> StateListener for LightAccessory<H> {
    fn on_state(&mut self, event: &StateEvent) {
        if let StateEvent::Light { pin, level } = event {
            if *pin == self.pin {
                self.apply_remote(*level);
            }
        }
    }
}
