use crate::{BusError, Calibration, ChipKind, DeviceInfo, InaBus, Result, INA_ADDRESS_RANGE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Raw values one channel reports, in the driver's native units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub bus_mv: u32,
    #[serde(default)]
    pub shunt_uv: i32,
    #[serde(default)]
    pub power_uw: i64,
    #[serde(default)]
    pub current_ua: i32,
}

/// One simulated part sitting on the mock bus.
#[derive(Clone, Debug)]
pub struct MockDevice {
    pub chip: ChipKind,
    pub readings: Vec<RawReading>,
    pub calibration: Option<Calibration>,
    pub averaging: Option<u16>,
}

/// A simple in-process mock bus. Devices are kept in address order, so discovery order matches
/// a real ascending address scan.
#[derive(Clone, Debug, Default)]
pub struct MockInaBus {
    devices: BTreeMap<u8, MockDevice>,
    found: Vec<u8>,
    fail_begin: bool,
    fail_info: BTreeSet<u8>,
}

impl MockInaBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a part at `address` with all-zero readings.
    pub fn with_device(mut self, address: u8, chip: ChipKind) -> Self {
        self.add_device(address, chip);
        self
    }

    pub fn add_device(&mut self, address: u8, chip: ChipKind) {
        self.devices.insert(
            address,
            MockDevice {
                chip,
                readings: vec![RawReading::default(); chip.channel_count() as usize],
                calibration: None,
                averaging: None,
            },
        );
    }

    /// Set what a channel reports. Unknown addresses or channels are ignored.
    pub fn set_reading(&mut self, address: u8, channel: u8, reading: RawReading) {
        if let Some(dev) = self.devices.get_mut(&address) {
            if let Some(slot) = dev.readings.get_mut(channel as usize) {
                *slot = reading;
            }
        }
    }

    /// Make the next scans fail with an I/O error.
    pub fn fail_begin(&mut self, fail: bool) {
        self.fail_begin = fail;
    }

    /// Make identification of the device at `address` fail with a NACK.
    pub fn fail_info(&mut self, address: u8) {
        self.fail_info.insert(address);
    }

    pub fn device_at(&self, address: u8) -> Option<&MockDevice> {
        self.devices.get(&address)
    }

    fn address_of(&self, device: u8) -> Result<u8> {
        self.found
            .get(device as usize)
            .copied()
            .ok_or(BusError::NoSuchDevice(device))
    }

    fn reading(&self, device: u8, channel: u8) -> Result<RawReading> {
        let addr = self.address_of(device)?;
        let dev = self.devices.get(&addr).ok_or(BusError::Nack(addr))?;
        dev.readings
            .get(channel as usize)
            .copied()
            .ok_or(BusError::NoSuchChannel { device, channel })
    }
}

impl InaBus for MockInaBus {
    fn begin(&mut self, calibration: Calibration) -> Result<u8> {
        if self.fail_begin {
            return Err(BusError::Io("bus scan failed".to_string()));
        }
        self.found = self
            .devices
            .keys()
            .copied()
            .filter(|a| INA_ADDRESS_RANGE.contains(a))
            .collect();
        for addr in &self.found {
            if let Some(dev) = self.devices.get_mut(addr) {
                dev.calibration = Some(calibration);
            }
        }
        tracing::debug!(found = self.found.len(), "mock bus scan complete");
        u8::try_from(self.found.len()).map_err(|_| BusError::Io("too many devices".to_string()))
    }

    fn begin_device(&mut self, calibration: Calibration, device: u8) -> Result<()> {
        let addr = self.address_of(device)?;
        let dev = self.devices.get_mut(&addr).ok_or(BusError::Nack(addr))?;
        dev.calibration = Some(calibration);
        Ok(())
    }

    fn device_info(&self, device: u8) -> Result<DeviceInfo> {
        let address = self.address_of(device)?;
        if self.fail_info.contains(&address) {
            return Err(BusError::Nack(address));
        }
        let dev = self.devices.get(&address).ok_or(BusError::Nack(address))?;
        Ok(DeviceInfo {
            address,
            chip: dev.chip,
        })
    }

    fn bus_millivolts(&mut self, device: u8, channel: u8) -> Result<u32> {
        Ok(self.reading(device, channel)?.bus_mv)
    }

    fn shunt_microvolts(&mut self, device: u8, channel: u8) -> Result<i32> {
        Ok(self.reading(device, channel)?.shunt_uv)
    }

    fn bus_microwatts(&mut self, device: u8, channel: u8) -> Result<i64> {
        Ok(self.reading(device, channel)?.power_uw)
    }

    fn bus_microamps(&mut self, device: u8, channel: u8) -> Result<i32> {
        Ok(self.reading(device, channel)?.current_ua)
    }

    fn set_averaging(&mut self, samples: u16, device: Option<u8>) -> Result<()> {
        let targets = match device {
            Some(d) => vec![self.address_of(d)?],
            None => self.found.clone(),
        };
        for addr in targets {
            if let Some(dev) = self.devices.get_mut(&addr) {
                dev.averaging = Some(samples);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_is_address_ordered() {
        let mut bus = MockInaBus::new()
            .with_device(0x45, ChipKind::Ina226)
            .with_device(0x40, ChipKind::Ina219)
            .with_device(0x41, ChipKind::Ina3221);

        let count = bus.begin(Calibration::default()).unwrap();
        assert_eq!(count, 3);
        assert_eq!(bus.device_info(0).unwrap().address, 0x40);
        assert_eq!(bus.device_info(1).unwrap().chip, ChipKind::Ina3221);
        assert_eq!(bus.device_info(2).unwrap().address, 0x45);
    }

    #[test]
    fn test_scan_skips_out_of_range_addresses() {
        let mut bus = MockInaBus::new()
            .with_device(0x3F, ChipKind::Ina219)
            .with_device(0x50, ChipKind::Ina219);
        assert_eq!(bus.begin(Calibration::default()).unwrap(), 0);
        assert!(matches!(bus.device_info(0), Err(BusError::NoSuchDevice(0))));
    }

    #[test]
    fn test_channel_bounds() {
        let mut bus = MockInaBus::new().with_device(0x40, ChipKind::Ina219);
        bus.set_reading(
            0x40,
            0,
            RawReading {
                bus_mv: 12_000,
                ..Default::default()
            },
        );
        bus.begin(Calibration::default()).unwrap();
        assert_eq!(bus.bus_millivolts(0, 0).unwrap(), 12_000);
        assert!(matches!(
            bus.bus_millivolts(0, 1),
            Err(BusError::NoSuchChannel {
                device: 0,
                channel: 1
            })
        ));
    }

    #[test]
    fn test_calibration_and_averaging_recorded() -> anyhow::Result<()> {
        let mut bus = MockInaBus::new()
            .with_device(0x40, ChipKind::Ina219)
            .with_device(0x42, ChipKind::Ina226);
        bus.begin(Calibration::new(1, 100_000))?;
        bus.begin_device(Calibration::new(200, 250), 1)?;
        bus.set_averaging(60, None)?;

        let first = bus.device_at(0x40).unwrap();
        assert_eq!(first.calibration, Some(Calibration::new(1, 100_000)));
        assert_eq!(first.averaging, Some(60));
        let second = bus.device_at(0x42).unwrap();
        assert_eq!(second.calibration, Some(Calibration::new(200, 250)));
        Ok(())
    }

    #[test]
    fn test_injected_faults() {
        let mut bus = MockInaBus::new()
            .with_device(0x40, ChipKind::Ina219)
            .with_device(0x41, ChipKind::Ina226);
        bus.fail_begin(true);
        assert!(matches!(bus.begin(Calibration::default()), Err(BusError::Io(_))));

        bus.fail_begin(false);
        bus.fail_info(0x41);
        assert_eq!(bus.begin(Calibration::default()).unwrap(), 2);
        assert_eq!(bus.device_info(0).unwrap().address, 0x40);
        assert!(matches!(bus.device_info(1), Err(BusError::Nack(0x41))));
    }
}
