//! power-monitor: logical slot mapping and periodic sampling for INA2xx power monitors
//!
//! A [`DeviceRegistry`] runs discovery once over an [`ina_bus::InaBus`] driver and flattens
//! every channel of every device found into a contiguous slot space. A [`ValueSampler`] polls
//! one `(slot, measurement)` pair on a [`Scheduler`], converts the raw reading to SI units and
//! forwards it to its [`Sink`]s.

mod types;
pub use types::{MeasurementKind, PhysicalDevice};

mod slots;
pub use slots::SlotTable;

mod registry;
pub use registry::{DeviceRegistry, RegistryError, DEFAULT_AVERAGING};

mod scheduler;
pub use scheduler::{ManualScheduler, RepeatTask, Scheduler, TokioScheduler};

mod sink;
pub use sink::{ChannelSink, Reading, Sink};

mod config;
pub use config::{ConfigError, ConfigStore, JsonFileConfigStore, MemoryConfigStore};

mod sampler;
pub use sampler::{SamplerState, ValueSampler, CONFIG_SCHEMA, DEFAULT_READ_DELAY};

mod loader;
pub use loader::{
    load_setup_file, parse_setup, CalibrationOverride, MockDeviceSpec, MonitorSetup, SamplerSpec,
};

mod metrics;
pub use metrics::{DeviceMetrics, MetricsHub};
