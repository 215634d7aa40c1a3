use crate::config::{ConfigError, ConfigStore};
use crate::metrics::DeviceMetrics;
use crate::registry::DeviceRegistry;
use crate::scheduler::Scheduler;
use crate::sink::Sink;
use crate::types::MeasurementKind;
use ina_bus::InaBus;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

/// Default poll period. With the registry's averaging and the chips' longest conversion time a
/// new value is ready about this often; polling faster repeats values.
pub const DEFAULT_READ_DELAY: Duration = Duration::from_millis(500);

/// Editable configuration of a [`ValueSampler`], as JSON schema.
pub const CONFIG_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "read_delay": { "title": "Read delay", "type": "number", "description": "The time, in milliseconds, between each read of the sensor" }
    }
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Constructed,
    Enabled,
    /// Declined to schedule; stays this way for the life of the sampler.
    Inert,
}

/// Polls one measurement of one slot and forwards it in SI units.
pub struct ValueSampler<B: InaBus + 'static> {
    registry: Arc<DeviceRegistry<B>>,
    slot: usize,
    kind: MeasurementKind,
    read_delay: Duration,
    config_path: String,
    sinks: Vec<Arc<dyn Sink>>,
    last_output: Arc<Mutex<Option<f64>>>,
    metrics: Option<DeviceMetrics>,
    state: SamplerState,
}

impl<B: InaBus + 'static> ValueSampler<B> {
    pub fn new(
        registry: Arc<DeviceRegistry<B>>,
        slot: usize,
        kind: MeasurementKind,
        read_delay: Duration,
    ) -> Self {
        Self {
            registry,
            slot,
            kind,
            read_delay,
            config_path: String::new(),
            sinks: Vec::new(),
            last_output: Arc::new(Mutex::new(None)),
            metrics: None,
            state: SamplerState::Constructed,
        }
    }

    /// Like [`new`](Self::new), then apply whatever `store` holds for `config_path`. A
    /// persisted `read_delay` wins over the one passed in; an empty path skips the lookup.
    pub fn with_config_path(
        registry: Arc<DeviceRegistry<B>>,
        slot: usize,
        kind: MeasurementKind,
        read_delay: Duration,
        config_path: impl Into<String>,
        store: &dyn ConfigStore,
    ) -> Self {
        let mut sampler = Self::new(registry, slot, kind, read_delay);
        sampler.config_path = config_path.into();
        sampler.load_configuration(store);
        sampler
    }

    fn load_configuration(&mut self, store: &dyn ConfigStore) {
        if self.config_path.is_empty() {
            return;
        }
        match store.load(&self.config_path) {
            Ok(Some(config)) => {
                if !self.set_configuration(&config) {
                    warn!(path = %self.config_path, "ignoring invalid persisted sampler config");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %self.config_path, error = %e, "failed to load sampler config")
            }
        }
    }

    pub fn with_metrics(mut self, metrics: DeviceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add a consumer. Sinks connected after [`enable`](Self::enable) are not notified.
    pub fn connect_to(&mut self, sink: Arc<dyn Sink>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn read_delay(&self) -> Duration {
        self.read_delay
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Most recently emitted value, if any tick has completed.
    pub fn last_output(&self) -> Option<f64> {
        self.last_output.lock().ok().and_then(|v| *v)
    }

    /// Register the repeating read with `scheduler`.
    ///
    /// Without detected sensors, or with a slot the registry does not have, the sampler logs
    /// and goes inert instead. Only the first call does anything: a changed `read_delay` is not
    /// picked up by an already running timer.
    pub fn enable<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        match self.state {
            SamplerState::Enabled => {
                warn!(slot = self.slot, kind = %self.kind, "sampler already enabled");
                return;
            }
            SamplerState::Inert => return,
            SamplerState::Constructed => {}
        }
        if !self.registry.sensor_detected() {
            error!("INA2xx sampler not enabled: no INA2xx sensors detected");
            self.state = SamplerState::Inert;
            return;
        }
        if self.slot >= self.registry.slot_count() {
            error!(
                slot = self.slot,
                slots = self.registry.slot_count(),
                "INA2xx sampler not enabled: no such slot"
            );
            self.state = SamplerState::Inert;
            return;
        }

        self.registry.mark_sampling();
        let mut task = SampleTask {
            registry: self.registry.clone(),
            slot: self.slot,
            kind: self.kind,
            sinks: self.sinks.clone(),
            last_output: self.last_output.clone(),
            metrics: self.metrics.clone(),
        };
        scheduler.on_repeat(self.read_delay, Box::new(move || task.run()));
        self.state = SamplerState::Enabled;
    }

    pub fn get_configuration(&self) -> Value {
        json!({ "read_delay": self.read_delay.as_millis() as u64 })
    }

    /// Apply `{"read_delay": ms}`. `read_delay` must be a non-negative number; fractions are
    /// rounded to whole milliseconds and schedulers run a zero delay at their shortest period.
    /// Anything else is rejected and leaves the sampler unchanged.
    pub fn set_configuration(&mut self, config: &Value) -> bool {
        let Some(delay) = config.get("read_delay").and_then(parse_millis) else {
            return false;
        };
        self.read_delay = Duration::from_millis(delay);
        true
    }

    pub fn get_config_schema(&self) -> &'static str {
        CONFIG_SCHEMA
    }

    /// Persist the current configuration under the sampler's config path.
    pub fn save_configuration(&self, store: &mut dyn ConfigStore) -> Result<(), ConfigError> {
        if self.config_path.is_empty() {
            return Ok(());
        }
        store.save(&self.config_path, &self.get_configuration())
    }
}

fn parse_millis(value: &Value) -> Option<u64> {
    if let Some(ms) = value.as_u64() {
        return Some(ms);
    }
    let f = value.as_f64()?;
    if !f.is_finite() || f < 0.0 {
        return None;
    }
    Some(f.round() as u64)
}

/// What a timer tick needs, and nothing else.
struct SampleTask<B: InaBus> {
    registry: Arc<DeviceRegistry<B>>,
    slot: usize,
    kind: MeasurementKind,
    sinks: Vec<Arc<dyn Sink>>,
    last_output: Arc<Mutex<Option<f64>>>,
    metrics: Option<DeviceMetrics>,
}

impl<B: InaBus> SampleTask<B> {
    fn run(&mut self) {
        let raw = match self.registry.read_raw(self.slot, self.kind) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(slot = self.slot, kind = %self.kind, error = %e, "INA2xx read failed");
                if let Some(m) = &self.metrics {
                    m.read_errors.inc();
                }
                return;
            }
        };
        let value = self.kind.scale(raw);
        if let Ok(mut last) = self.last_output.lock() {
            *last = Some(value);
        }
        for sink in &self.sinks {
            sink.notify(value);
        }
        if let Some(m) = &self.metrics {
            m.samples_emitted.inc();
        }
    }
}
