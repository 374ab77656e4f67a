//! `onewire-ds18b20` is a library for reading a `DS18B20` temperature sensor
//! over a 1-Wire bus driven entirely in software.
//!
//! No dedicated 1-Wire peripheral is needed: the bus master toggles a single
//! open-drain GPIO line, times the protocol with busy-wait delays and masks
//! interrupts around the few instants where a delay of some microseconds
//! would corrupt the transfer.
//!
//! The crate is organized in layers:
//!
//! - [`pin`] defines the line primitives and adapts `embedded-hal` pins
//! - [`atomic`] provides the scoped interrupt masking
//! - [`onewire`] implements reset, time slots and byte transfers
//! - [`ds18b20`] implements the sensor commands
//! - [`temperature`] holds resolution and temperature register values
//!
//! Only the `Skip ROM` broadcast addressing is supported, hence the bus must
//! carry a single device.
//!
//! The crate is `no_std` and architecture-agnostic.
//!
//! # Features
//!
//! - `critical-section` (default): masks interrupts through the
//!   `critical-section` implementation of the target
//! - `async` (default): waits for a conversion with an asynchronous delay

#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![deny(missing_docs)]

/// Scoped interrupt masking.
#[allow(unsafe_code)]
pub mod atomic;
/// The `DS18B20` sensor driver.
pub mod ds18b20;
/// Error management.
pub mod error;
/// The software 1-Wire bus master.
pub mod onewire;
/// Bus line primitives.
pub mod pin;
/// Resolution and temperature register values.
pub mod temperature;

#[cfg(test)]
#[allow(unsafe_code)]
mod sim;

pub use ds18b20::Ds18b20;
pub use error::Error;
pub use onewire::OneWire;
pub use pin::{BusPin, OpenDrain};
pub use temperature::{RawTemperature, Resolution};
