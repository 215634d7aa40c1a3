use core::fmt;
use core::ops::RangeInclusive;
use serde::{Deserialize, Serialize};

/// 7-bit addresses an INA2xx part can be strapped to.
pub const INA_ADDRESS_RANGE: RangeInclusive<u8> = 0x40..=0x4F;

/// Supported INA2xx family members
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipKind {
    Ina219,
    Ina226,
    Ina228,
    Ina230,
    Ina231,
    Ina260,
    Ina3221,
}

impl ChipKind {
    /// Number of independent measurement channels on the part.
    pub fn channel_count(&self) -> u8 {
        match self {
            ChipKind::Ina3221 => 3,
            _ => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChipKind::Ina219 => "INA219",
            ChipKind::Ina226 => "INA226",
            ChipKind::Ina228 => "INA228",
            ChipKind::Ina230 => "INA230",
            ChipKind::Ina231 => "INA231",
            ChipKind::Ina260 => "INA260",
            ChipKind::Ina3221 => "INA3221",
        }
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shunt calibration handed to the driver when a device is initialised.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Largest current expected through the shunt, in amps.
    pub max_amps: u16,
    /// Shunt resistor value in micro-ohms (100_000 is 0.1 ohm).
    pub shunt_micro_ohms: u32,
}

impl Calibration {
    pub fn new(max_amps: u16, shunt_micro_ohms: u32) -> Self {
        Self {
            max_amps,
            shunt_micro_ohms,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(1, 100_000)
    }
}

/// A device found during discovery
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceInfo {
    pub address: u8,
    pub chip: ChipKind,
}

impl DeviceInfo {
    pub fn name(&self) -> &'static str {
        self.chip.name()
    }

    pub fn channel_count(&self) -> u8 {
        self.chip.channel_count()
    }
}
