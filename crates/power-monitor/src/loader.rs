use crate::types::MeasurementKind;
use anyhow::Context;
use ina_bus::{Calibration, ChipKind, MockInaBus, RawReading};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Everything needed to bring up a monitor: calibration, which values to sample, and for the
/// mock backend the simulated bus population.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSetup {
    #[serde(default)]
    pub calibration: Calibration,
    /// Overrides the registry's averaging window for all devices.
    #[serde(default)]
    pub averaging: Option<u16>,
    #[serde(default)]
    pub overrides: Vec<CalibrationOverride>,
    #[serde(default)]
    pub samplers: Vec<SamplerSpec>,
    #[serde(default)]
    pub mock_devices: Vec<MockDeviceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationOverride {
    pub device: usize,
    #[serde(flatten)]
    pub calibration: Calibration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSpec {
    /// Telemetry path the readings are published under.
    pub path: String,
    pub slot: usize,
    pub kind: MeasurementKind,
    #[serde(default = "default_read_delay_ms")]
    pub read_delay_ms: u64,
    #[serde(default)]
    pub config_path: String,
}

fn default_read_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockDeviceSpec {
    pub address: u8,
    pub chip: ChipKind,
    #[serde(default)]
    pub channels: Vec<RawReading>,
}

impl MonitorSetup {
    /// Build a mock bus holding `mock_devices`.
    pub fn mock_bus(&self) -> MockInaBus {
        let mut bus = MockInaBus::new();
        for dev in &self.mock_devices {
            bus.add_device(dev.address, dev.chip);
            for (ch, reading) in dev.channels.iter().enumerate() {
                if let Ok(ch) = u8::try_from(ch) {
                    bus.set_reading(dev.address, ch, *reading);
                }
            }
        }
        bus
    }
}

pub fn parse_setup(raw: &str) -> anyhow::Result<MonitorSetup> {
    let setup: MonitorSetup = serde_yaml::from_str(raw).context("decoding monitor setup")?;
    Ok(setup)
}

pub fn load_setup_file(path: impl AsRef<Path>) -> anyhow::Result<MonitorSetup> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading setup: {}", path.display()))?;
    parse_setup(&raw).with_context(|| format!("parsing setup: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ina_bus::InaBus;

    const SETUP: &str = r#"
calibration:
  max_amps: 1
  shunt_micro_ohms: 100000
overrides:
  - device: 1
    max_amps: 200
    shunt_micro_ohms: 250
samplers:
  - path: electrical.batteries.house.voltage
    slot: 0
    kind: bus_voltage
    read_delay_ms: 1000
    config_path: /sensors/house/voltage
  - path: electrical.bowThruster.amps
    slot: 1
    kind: current
mock_devices:
  - address: 64
    chip: ina219
    channels:
      - bus_mv: 12500
        current_ua: 500000
  - address: 66
    chip: ina226
"#;

    #[test]
    fn test_parse_setup() {
        let setup = parse_setup(SETUP).unwrap();
        assert_eq!(setup.calibration, Calibration::new(1, 100_000));
        assert_eq!(setup.averaging, None);
        assert_eq!(setup.overrides[0].device, 1);
        assert_eq!(setup.overrides[0].calibration, Calibration::new(200, 250));
        assert_eq!(setup.samplers.len(), 2);
        assert_eq!(setup.samplers[0].kind, MeasurementKind::BusVoltage);
        assert_eq!(setup.samplers[1].read_delay_ms, 500);
        assert_eq!(setup.samplers[1].config_path, "");
    }

    #[test]
    fn test_mock_bus_from_setup() {
        let setup = parse_setup(SETUP).unwrap();
        let mut bus = setup.mock_bus();
        assert_eq!(bus.begin(setup.calibration).unwrap(), 2);
        assert_eq!(bus.bus_millivolts(0, 0).unwrap(), 12_500);
        assert_eq!(bus.bus_microamps(0, 0).unwrap(), 500_000);
        assert_eq!(bus.device_info(1).unwrap().chip, ChipKind::Ina226);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let bad = "samplers:\n  - path: x\n    slot: 0\n    kind: frequency\n";
        assert!(parse_setup(bad).is_err());
    }

    #[test]
    fn test_empty_setup_uses_defaults() {
        let setup = parse_setup("{}").unwrap();
        assert_eq!(setup.calibration, Calibration::default());
        assert!(setup.samplers.is_empty());
    }
}
