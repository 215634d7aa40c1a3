use crate::{Calibration, DeviceInfo, Result};

/// A blocking INA2xx driver for every monitor found on one I2C bus.
///
/// Devices are addressed by index, `0..count`, in ascending bus-address order as produced by
/// [`InaBus::begin`]. Multi-channel parts take a channel number; single-channel parts only
/// accept channel 0. Implementations must bound their own latency, since every read is made
/// from a shared scheduler loop.
pub trait InaBus: Send {
    /// Scan the valid address range, initialise every device found with `calibration`, and
    /// return how many were found.
    fn begin(&mut self, calibration: Calibration) -> Result<u8>;

    /// Re-initialise a single device with its own calibration.
    fn begin_device(&mut self, calibration: Calibration, device: u8) -> Result<()>;

    /// Identity of a discovered device.
    fn device_info(&self, device: u8) -> Result<DeviceInfo>;

    fn bus_millivolts(&mut self, device: u8, channel: u8) -> Result<u32>;

    fn shunt_microvolts(&mut self, device: u8, channel: u8) -> Result<i32>;

    fn bus_microwatts(&mut self, device: u8, channel: u8) -> Result<i64>;

    fn bus_microamps(&mut self, device: u8, channel: u8) -> Result<i32>;

    /// Set the number of internal samples averaged per reading; `None` applies to all devices.
    fn set_averaging(&mut self, samples: u16, device: Option<u8>) -> Result<()>;
}
