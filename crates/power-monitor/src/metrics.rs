use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct DeviceMetrics {
    pub samples_emitted: IntCounter,
    pub read_errors: IntCounter,
    pub devices_detected: IntGauge,
    pub slots_assigned: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub dev: DeviceMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let samples_emitted =
            IntCounter::new("pm_samples_emitted", "Total scaled samples emitted")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let read_errors = IntCounter::new("pm_read_errors", "Total failed raw reads")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let devices_detected =
            IntGauge::new("pm_devices_detected", "Number of INA2xx devices discovered")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let slots_assigned = IntGauge::new("pm_slots_assigned", "Number of logical slots")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let dev = DeviceMetrics {
            samples_emitted,
            read_errors,
            devices_detected,
            slots_assigned,
        };
        let _ = registry.register(Box::new(dev.samples_emitted.clone()));
        let _ = registry.register(Box::new(dev.read_errors.clone()));
        let _ = registry.register(Box::new(dev.devices_detected.clone()));
        let _ = registry.register(Box::new(dev.slots_assigned.clone()));
        Ok(Self { registry, dev })
    }

    /// Record what discovery found.
    pub fn observe_discovery(&self, devices: usize, slots: usize) {
        self.dev.devices_detected.set(devices as i64);
        self.dev.slots_assigned.set(slots as i64);
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
