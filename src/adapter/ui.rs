//! Browser-style control panel adapter for a single pin-less blind:
//! a target slider, open/close and manual jog buttons, and a position
//! progress indicator. Markup and styling are the display's problem;
//! this adapter only translates between controls and commands.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{CalibrationMark, Command, Jog, StateEvent};
use crate::sync::{EchoGuard, StateListener};

/// The toolkit side of the panel: whatever draws the slider and the
/// progress bar.
pub trait BlindDisplay {
    /// Current device position (progress indicator).
    fn show_position(&mut self, percent: u8);
    /// Device-reported target (slider value).
    fn show_target(&mut self, percent: u8);
}

/// Control panel for one blind.
pub struct BlindPanel<D: BlindDisplay> {
    display: D,
    guard: EchoGuard,
    commands: mpsc::Sender<Command>,
}

impl<D: BlindDisplay> BlindPanel<D> {
    pub fn new(display: D, commands: mpsc::Sender<Command>) -> Self {
        Self {
            display,
            guard: EchoGuard::new(),
            commands,
        }
    }

    /// Open button: slider to 0, blind fully open.
    pub fn open(&mut self) {
        self.move_to(0);
    }

    /// Close button: slider to 100, blind fully closed.
    pub fn close(&mut self) {
        self.move_to(100);
    }

    fn move_to(&mut self, percent: u8) {
        self.display.show_target(percent);
        self.slider_changed(Some(percent));
    }

    /// Toolkit change-handler for the slider. Suppressed while a
    /// device-reported target is being applied; `None` (no value yet)
    /// never produces a command.
    pub fn slider_changed(&mut self, percent: Option<u8>) {
        if self.guard.suppressed() {
            return;
        }
        let Some(level) = percent else {
            return;
        };
        debug!("Slider moved to {}", level);
        self.send(Command::Set { pin: None, level });
    }

    pub fn jog_up(&mut self) {
        self.send(Command::Jog(Jog::Up));
    }

    pub fn jog_down(&mut self) {
        self.send(Command::Jog(Jog::Down));
    }

    pub fn jog_stop(&mut self) {
        self.send(Command::Jog(Jog::Stop));
    }

    /// Record the current physical position as the travel start.
    pub fn calibrate_start(&mut self) {
        self.send(Command::Calibrate(CalibrationMark::Start));
    }

    /// Record the current physical position as the travel maximum.
    pub fn calibrate_max(&mut self) {
        self.send(Command::Calibrate(CalibrationMark::Max));
    }

    fn send(&self, cmd: Command) {
        if self.commands.try_send(cmd).is_err() {
            warn!("Dropping panel command: channel full or closed");
        }
    }
}

impl<D: BlindDisplay> StateListener for BlindPanel<D> {
    fn on_state(&mut self, event: &StateEvent) {
        match event {
            StateEvent::Position(percent) => self.display.show_position(*percent),
            StateEvent::Target(percent) => {
                // Move the slider, then absorb the toolkit's synchronous
                // change notification under the guard.
                self.display.show_target(*percent);
                self.guard.engage();
                self.slider_changed(Some(*percent));
                self.guard.release();
            }
            StateEvent::Light { .. } => {}
        }
    }
}
