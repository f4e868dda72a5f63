//! # blindlink
//!
//! WebSocket client and bridge for ESP8266 blind and dimmer controllers.
//!
//! The controller pushes JSON state frames over a plain websocket on
//! port 81 and accepts short ASCII command frames back. This crate keeps
//! any number of observers consistent with the device without command
//! feedback loops:
//!
//! - `protocol` — wire codec: commands out, typed state events in
//! - `connection` — one managed websocket per device: reconnect
//!   schedule, lifecycle events, refresh-on-connect, fire-and-drop send
//! - `sync` — echo suppression and state fan-out
//! - `adapter` — consumers: a browser-style blind panel and a
//!   home-automation light accessory per pin
//! - `config` — env + JSON devices file for the bridge binary

pub mod adapter;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod sync;

pub use adapter::{BlindDisplay, BlindPanel, CharacteristicHost, LightAccessory};
pub use connection::{Connection, Endpoint, LinkError, LinkEvent, LinkState, RetryPolicy};
pub use protocol::{CalibrationMark, Command, DecodeError, Jog, StateEvent};
pub use sync::{EchoGuard, StateListener, Synchronizer};
