use core::fmt;
use ina_bus::{Calibration, ChipKind};
use serde::{Deserialize, Serialize};

/// Which value a sampler reads from its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    BusVoltage,
    ShuntVoltage,
    Power,
    Current,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 4] = [
        MeasurementKind::BusVoltage,
        MeasurementKind::ShuntVoltage,
        MeasurementKind::Power,
        MeasurementKind::Current,
    ];

    /// Raw units per SI unit: millivolts for bus voltage, micro-units for the rest.
    pub fn divisor(&self) -> f64 {
        match self {
            MeasurementKind::BusVoltage => 1_000.0,
            MeasurementKind::ShuntVoltage | MeasurementKind::Power | MeasurementKind::Current => {
                1_000_000.0
            }
        }
    }

    /// Convert a raw driver reading to volts, watts or amps.
    pub fn scale(&self, raw: i64) -> f64 {
        raw as f64 / self.divisor()
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MeasurementKind::BusVoltage | MeasurementKind::ShuntVoltage => "V",
            MeasurementKind::Power => "W",
            MeasurementKind::Current => "A",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::BusVoltage => "bus_voltage",
            MeasurementKind::ShuntVoltage => "shunt_voltage",
            MeasurementKind::Power => "power",
            MeasurementKind::Current => "current",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered part as the registry sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDevice {
    /// Index the driver uses for this part.
    pub bus_index: u8,
    pub address: u8,
    pub chip: ChipKind,
    pub channel_count: u8,
    pub calibration: Calibration,
}

impl PhysicalDevice {
    pub fn name(&self) -> &'static str {
        self.chip.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion_is_exact() {
        assert_eq!(MeasurementKind::BusVoltage.scale(12_500), 12.5);
        assert_eq!(MeasurementKind::ShuntVoltage.scale(45_000), 0.045);
        assert_eq!(MeasurementKind::Power.scale(2_000_000), 2.0);
        assert_eq!(MeasurementKind::Current.scale(500_000), 0.5);
    }

    #[test]
    fn test_negative_readings_keep_sign() {
        assert_eq!(MeasurementKind::Current.scale(-250_000), -0.25);
        assert_eq!(MeasurementKind::ShuntVoltage.scale(-10), -0.00001);
    }

    #[test]
    fn test_units() {
        assert_eq!(MeasurementKind::BusVoltage.unit(), "V");
        assert_eq!(MeasurementKind::ShuntVoltage.unit(), "V");
        assert_eq!(MeasurementKind::Power.unit(), "W");
        assert_eq!(MeasurementKind::Current.unit(), "A");
    }

    #[test]
    fn test_kind_names_match_serde() {
        for kind in MeasurementKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
