//! ina-bus: INA2xx current/power monitor bus abstractions
//!
//! This crate provides the trait and types a power-monitor driver exposes to the rest of the
//! workspace: address-range discovery, per-device identity, and raw readings in milli/micro
//! units. The default build enables a `mock` backend so that binaries and tests can run on any
//! host without an I2C adapter.

mod types;
pub use types::{Calibration, ChipKind, DeviceInfo, INA_ADDRESS_RANGE};

mod error;
pub use error::{BusError, Result};

mod traits;
pub use traits::InaBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockDevice, MockInaBus, RawReading};
