//! Client adapters built on the connection and codec: a browser-style
//! blind panel and a home-automation light accessory.

pub mod accessory;
pub mod ui;

pub use accessory::{CharacteristicHost, LightAccessory};
pub use ui::{BlindDisplay, BlindPanel};
