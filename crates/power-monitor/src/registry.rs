use crate::slots::SlotTable;
use crate::types::{MeasurementKind, PhysicalDevice};
use ina_bus::{BusError, Calibration, InaBus};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

/// Averaging window applied to every device after discovery. The chips power up averaging a
/// single sample; 60 trades latency for a much quieter reading.
pub const DEFAULT_AVERAGING: u16 = 60;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no INA2xx sensors detected")]
    NotDetected,
    #[error("no such slot: {0}")]
    UnknownSlot(usize),
    #[error("no such device: {0}")]
    UnknownDevice(usize),
    #[error("calibration is read-only once sampling has started")]
    SamplingStarted,
    #[error("registry lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Bus(#[from] BusError),
}

struct Inner<B> {
    driver: B,
    devices: Vec<PhysicalDevice>,
    averaging: u16,
}

/// Every INA2xx on one bus, flattened into logical slots.
///
/// Built once by [`DeviceRegistry::initialize`]. A registry that found nothing stays alive but
/// inert: it has no slots and every sampler built on it declines to schedule.
pub struct DeviceRegistry<B: InaBus> {
    inner: Mutex<Inner<B>>,
    slots: SlotTable,
    detected: bool,
    default_calibration: Calibration,
    sampling: AtomicBool,
}

impl<B: InaBus> DeviceRegistry<B> {
    /// Scan the bus, calibrate every device with `default_calibration` and assign slots.
    ///
    /// The bus itself must already be up; the driver only talks to it.
    pub fn initialize(mut driver: B, default_calibration: Calibration) -> Self {
        let count = match driver.begin(default_calibration) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "INA2xx bus scan failed");
                0
            }
        };
        if count == 0 {
            error!("No INA2xx sensors found: check wiring");
            return Self::inert(driver, default_calibration);
        }

        let mut devices = Vec::with_capacity(count as usize);
        for i in 0..count {
            match driver.device_info(i) {
                Ok(dev) => devices.push(PhysicalDevice {
                    bus_index: i,
                    address: dev.address,
                    chip: dev.chip,
                    channel_count: dev.channel_count(),
                    calibration: default_calibration,
                }),
                Err(e) => warn!(device = i, error = %e, "skipping unidentified INA2xx device"),
            }
        }
        if devices.is_empty() {
            error!("No INA2xx sensors could be identified: check wiring");
            return Self::inert(driver, default_calibration);
        }

        let slots = SlotTable::from_channel_counts(devices.iter().map(|d| d.channel_count));
        info!(
            "Found {} INA2xx devices ({} slots) on the I2C bus",
            devices.len(),
            slots.len()
        );
        for (dev, range) in devices.iter().zip(slots.ranges()) {
            info!(
                "Slots {:>2}..={:<2} addr 0x{:02X} {}",
                range.start,
                range.end.saturating_sub(1),
                dev.address,
                dev.name()
            );
        }

        if let Err(e) = driver.set_averaging(DEFAULT_AVERAGING, None) {
            warn!(error = %e, "failed to set INA2xx averaging");
        }

        Self {
            inner: Mutex::new(Inner {
                driver,
                devices,
                averaging: DEFAULT_AVERAGING,
            }),
            slots,
            detected: true,
            default_calibration,
            sampling: AtomicBool::new(false),
        }
    }

    fn inert(driver: B, default_calibration: Calibration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                driver,
                devices: Vec::new(),
                averaging: DEFAULT_AVERAGING,
            }),
            slots: SlotTable::default(),
            detected: false,
            default_calibration,
            sampling: AtomicBool::new(false),
        }
    }

    pub fn sensor_detected(&self) -> bool {
        self.detected
    }

    pub fn default_calibration(&self) -> Calibration {
        self.default_calibration
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn device_count(&self) -> usize {
        self.slots.device_count()
    }

    pub fn slot_ranges(&self) -> &[Range<usize>] {
        self.slots.ranges()
    }

    /// Registry device index and channel behind a slot.
    pub fn locate(&self, slot: usize) -> Option<(usize, u8)> {
        self.slots.locate(slot)
    }

    /// Snapshot of the discovered devices with their current calibration.
    pub fn devices(&self) -> Result<Vec<PhysicalDevice>, RegistryError> {
        let inner = self.inner.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(inner.devices.clone())
    }

    /// Averaging window currently applied to every device.
    pub fn averaging(&self) -> Result<u16, RegistryError> {
        let inner = self.inner.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(inner.averaging)
    }

    /// Change the averaging window of every device. The new window is also what a later
    /// calibration override restores.
    pub fn set_averaging(&self, samples: u16) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().map_err(|_| RegistryError::Poisoned)?;
        if let Err(e) = inner.driver.set_averaging(samples, None) {
            warn!(samples, error = %e, "failed to set INA2xx averaging");
            return Err(e.into());
        }
        inner.averaging = samples;
        Ok(())
    }

    /// Override the calibration of one device, and so of all its channels.
    ///
    /// Only allowed before the first sampler is enabled. Re-initialising the device may reset
    /// its configuration, so the registry's averaging window is applied to it again. Every
    /// failure is logged before it is returned.
    pub fn set_calibration(
        &self,
        device: usize,
        calibration: Calibration,
    ) -> Result<(), RegistryError> {
        if self.is_sampling() {
            warn!(device, "ignoring calibration change: sampling already started");
            return Err(RegistryError::SamplingStarted);
        }
        let mut inner = self.inner.lock().map_err(|_| {
            warn!(device, "ignoring calibration change: registry lock poisoned");
            RegistryError::Poisoned
        })?;
        let Inner {
            driver,
            devices,
            averaging,
        } = &mut *inner;
        let Some(dev) = devices.get_mut(device) else {
            warn!(device, "ignoring calibration for unknown INA2xx device");
            return Err(RegistryError::UnknownDevice(device));
        };
        if let Err(e) = driver.begin_device(calibration, dev.bus_index) {
            warn!(device, error = %e, "failed to re-initialise INA2xx device");
            return Err(e.into());
        }
        dev.calibration = calibration;
        if let Err(e) = driver.set_averaging(*averaging, Some(dev.bus_index)) {
            warn!(device, error = %e, "failed to restore INA2xx averaging");
            return Err(e.into());
        }
        info!(
            device,
            max_amps = calibration.max_amps,
            shunt_micro_ohms = calibration.shunt_micro_ohms,
            "calibration override applied"
        );
        Ok(())
    }

    /// Same as [`set_calibration`](Self::set_calibration) for the device owning `slot`.
    pub fn set_calibration_for_slot(
        &self,
        slot: usize,
        calibration: Calibration,
    ) -> Result<(), RegistryError> {
        let (device, _) = self.slots.locate(slot).ok_or_else(|| {
            warn!(slot, "ignoring calibration for unknown slot");
            RegistryError::UnknownSlot(slot)
        })?;
        self.set_calibration(device, calibration)
    }

    /// Read one raw value in the driver's native unit: millivolts for bus voltage, micro-units
    /// for everything else.
    pub fn read_raw(&self, slot: usize, kind: MeasurementKind) -> Result<i64, RegistryError> {
        if !self.detected {
            return Err(RegistryError::NotDetected);
        }
        let (device, channel) = self
            .slots
            .locate(slot)
            .ok_or(RegistryError::UnknownSlot(slot))?;
        let mut inner = self.inner.lock().map_err(|_| RegistryError::Poisoned)?;
        let Inner { driver, devices, .. } = &mut *inner;
        let idx = devices
            .get(device)
            .map(|d| d.bus_index)
            .ok_or(RegistryError::UnknownSlot(slot))?;
        let raw = match kind {
            MeasurementKind::BusVoltage => i64::from(driver.bus_millivolts(idx, channel)?),
            MeasurementKind::ShuntVoltage => i64::from(driver.shunt_microvolts(idx, channel)?),
            MeasurementKind::Power => driver.bus_microwatts(idx, channel)?,
            MeasurementKind::Current => i64::from(driver.bus_microamps(idx, channel)?),
        };
        Ok(raw)
    }

    /// Run `f` against the driver, e.g. to change conversion times or averaging before
    /// sampling starts.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, RegistryError> {
        let mut inner = self.inner.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(f(&mut inner.driver))
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sampling(&self) {
        self.sampling.store(true, Ordering::Release);
    }
}
