//! Wire codec for the blind/dimmer controller protocol.
//!
//! Outbound commands are short ASCII frames, one instruction per frame:
//!
//! - `42` / `(a)42` — absolute set to 42%, pin-less / pin `a`
//! - `(-1)` / `(1)` / `(0)` — jog up / down / stop
//! - `(on-a)` / `(off-a)` — power for pin `a`
//! - `(update)` / `(update-a)` — request a full state report
//! - `(start)` / `(max)` — mark travel-limit calibration points
//!
//! Inbound frames are single JSON objects with optional keys `position`,
//! `set` and `lightState` (pin name → level). Unknown keys are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// An outbound instruction for the device. Built by an adapter, encoded
/// and written to the socket by the connection, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Absolute position/brightness set, 0–100.
    Set { pin: Option<String>, level: u8 },
    /// Relative movement of the pin-less blind target.
    Jog(Jog),
    /// Power toggle for a named pin.
    Power { pin: String, on: bool },
    /// Ask the device to re-emit its current state.
    Refresh { pin: Option<String> },
    /// Record the current physical position as a travel limit.
    Calibrate(CalibrationMark),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jog {
    Up,
    Down,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMark {
    Start,
    Max,
}

impl Command {
    /// Encode into the device's text frame. Levels are clamped to 100.
    pub fn encode(&self) -> String {
        match self {
            Command::Set { pin: None, level } => u8::min(*level, 100).to_string(),
            Command::Set {
                pin: Some(pin),
                level,
            } => format!("({pin}){}", u8::min(*level, 100)),
            Command::Jog(Jog::Up) => "(-1)".to_string(),
            Command::Jog(Jog::Down) => "(1)".to_string(),
            Command::Jog(Jog::Stop) => "(0)".to_string(),
            Command::Power { pin, on: true } => format!("(on-{pin})"),
            Command::Power { pin, on: false } => format!("(off-{pin})"),
            Command::Refresh { pin: None } => "(update)".to_string(),
            Command::Refresh { pin: Some(pin) } => format!("(update-{pin})"),
            Command::Calibrate(CalibrationMark::Start) => "(start)".to_string(),
            Command::Calibrate(CalibrationMark::Max) => "(max)".to_string(),
        }
    }
}

/// A single decoded state change reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// Current absolute position of the pin-less blind.
    Position(u8),
    /// Device-reported target, used to keep a manual set-control in sync.
    Target(u8),
    /// Current level of one named pin.
    Light { pin: String, level: u8 },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("value {value} out of range for {field}")]
    OutOfRange { field: String, value: i64 },
}

#[derive(Deserialize)]
struct Frame {
    position: Option<i64>,
    set: Option<i64>,
    #[serde(rename = "lightState")]
    light_state: Option<BTreeMap<String, i64>>,
}

fn checked_level(field: &str, value: i64) -> Result<u8, DecodeError> {
    if (0..=100).contains(&value) {
        Ok(value as u8)
    } else {
        Err(DecodeError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Decode one inbound JSON frame into zero or more state events.
///
/// A frame may carry several keys at once; events are produced in the
/// order `position`, `set`, then `lightState` entries. Any malformed or
/// out-of-range value rejects the whole frame.
pub fn decode(raw: &str) -> Result<Vec<StateEvent>, DecodeError> {
    let frame: Frame = serde_json::from_str(raw)?;
    let mut events = Vec::new();

    if let Some(value) = frame.position {
        events.push(StateEvent::Position(checked_level("position", value)?));
    }
    if let Some(value) = frame.set {
        events.push(StateEvent::Target(checked_level("set", value)?));
    }
    if let Some(lights) = frame.light_state {
        for (pin, value) in lights {
            let level = checked_level(&format!("lightState.{pin}"), value)?;
            events.push(StateEvent::Light { pin, level });
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_pinless_set() {
        let cmd = Command::Set {
            pin: None,
            level: 42,
        };
        assert_eq!(cmd.encode(), "42");
    }

    #[test]
    fn encodes_pinned_set() {
        let cmd = Command::Set {
            pin: Some("a".to_string()),
            level: 77,
        };
        assert_eq!(cmd.encode(), "(a)77");
    }

    #[test]
    fn clamps_overrange_set() {
        let cmd = Command::Set {
            pin: None,
            level: 250,
        };
        assert_eq!(cmd.encode(), "100");
    }

    #[test]
    fn encodes_jog_instructions() {
        assert_eq!(Command::Jog(Jog::Up).encode(), "(-1)");
        assert_eq!(Command::Jog(Jog::Down).encode(), "(1)");
        assert_eq!(Command::Jog(Jog::Stop).encode(), "(0)");
    }

    #[test]
    fn encodes_power_and_refresh() {
        let on = Command::Power {
            pin: "b".to_string(),
            on: true,
        };
        let off = Command::Power {
            pin: "b".to_string(),
            on: false,
        };
        assert_eq!(on.encode(), "(on-b)");
        assert_eq!(off.encode(), "(off-b)");
        assert_eq!(Command::Refresh { pin: None }.encode(), "(update)");
        assert_eq!(
            Command::Refresh {
                pin: Some("b".to_string())
            }
            .encode(),
            "(update-b)"
        );
    }

    #[test]
    fn encodes_calibration_marks() {
        assert_eq!(Command::Calibrate(CalibrationMark::Start).encode(), "(start)");
        assert_eq!(Command::Calibrate(CalibrationMark::Max).encode(), "(max)");
    }

    #[test]
    fn decodes_position_and_target() {
        let events = decode(r#"{"position": 30, "set": 65}"#).unwrap();
        assert_eq!(
            events,
            vec![StateEvent::Position(30), StateEvent::Target(65)]
        );
    }

    #[test]
    fn decodes_light_state_exactly() {
        let events = decode(r#"{"lightState": {"a": 42, "b": 0}}"#).unwrap();
        assert_eq!(
            events,
            vec![
                StateEvent::Light {
                    pin: "a".to_string(),
                    level: 42
                },
                StateEvent::Light {
                    pin: "b".to_string(),
                    level: 0
                },
            ]
        );
    }

    #[test]
    fn ignores_unknown_keys() {
        let events = decode(r#"{"position": 10, "rssi": -60}"#).unwrap();
        assert_eq!(events, vec![StateEvent::Position(10)]);
    }

    #[test]
    fn empty_object_decodes_to_no_events() {
        assert!(decode("{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode("{nope"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("[1,2]"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            decode(r#"{"position": 101}"#),
            Err(DecodeError::OutOfRange { value: 101, .. })
        ));
        assert!(matches!(
            decode(r#"{"lightState": {"a": -5}}"#),
            Err(DecodeError::OutOfRange { value: -5, .. })
        ));
    }

    #[test]
    fn boundary_values_round_trip() {
        let events = decode(r#"{"lightState": {"a": 0, "b": 100}}"#).unwrap();
        assert_eq!(
            events,
            vec![
                StateEvent::Light {
                    pin: "a".to_string(),
                    level: 0
                },
                StateEvent::Light {
                    pin: "b".to_string(),
                    level: 100
                },
            ]
        );
    }
}
