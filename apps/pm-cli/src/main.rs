use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ina_bus::MockInaBus;
use power_monitor as pm;
use power_monitor::{ConfigStore, DeviceRegistry, MonitorSetup, ValueSampler};

#[derive(Parser, Debug)]
#[command(
    name = "pm",
    version,
    about = "INA2xx power monitor CLI",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover devices and print the slot table
    Scan {
        /// Monitor setup YAML
        #[arg(long, default_value = "configs/monitor.yaml")]
        setup: String,
    },
    /// Print the sampler configuration schema
    Schema,
    /// Sample every configured slot and print readings as JSON lines
    Run {
        /// Monitor setup YAML
        #[arg(long, default_value = "configs/monitor.yaml")]
        setup: String,
        /// JSON file holding persisted sampler configuration
        #[arg(long)]
        store: Option<String>,
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Print Prometheus metrics on exit
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { setup } => scan(&setup),
        Commands::Schema => {
            println!("{}", pm::CONFIG_SCHEMA);
            Ok(())
        }
        Commands::Run {
            setup,
            store,
            duration_secs,
            metrics,
        } => {
            // Every sampler tick shares this one loop.
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(run(&setup, store.as_deref(), duration_secs, metrics))
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_registry(setup: &MonitorSetup) -> DeviceRegistry<MockInaBus> {
    let registry = DeviceRegistry::initialize(setup.mock_bus(), setup.calibration);
    if !registry.sensor_detected() {
        return registry;
    }
    if let Some(samples) = setup.averaging {
        match registry.set_averaging(samples) {
            Ok(()) => info!(samples, "averaging override applied"),
            Err(e) => warn!(samples, error = %e, "averaging override failed"),
        }
    }
    for o in &setup.overrides {
        if let Err(e) = registry.set_calibration(o.device, o.calibration) {
            warn!(device = o.device, error = %e, "calibration override failed");
        }
    }
    registry
}

fn scan(setup_path: &str) -> Result<()> {
    let setup = pm::load_setup_file(setup_path)?;
    let registry = build_registry(&setup);
    if !registry.sensor_detected() {
        println!("no INA2xx devices found");
        return Ok(());
    }
    let default = registry.default_calibration();
    println!(
        "default calibration: {} A, {} uohm; averaging {}",
        default.max_amps,
        default.shunt_micro_ohms,
        registry.averaging()?
    );
    println!("slots\taddr\tchip\tmax_amps\tshunt_uohm");
    for (dev, range) in registry.devices()?.iter().zip(registry.slot_ranges()) {
        println!(
            "{}..={}\t0x{:02X}\t{}\t{}\t{}",
            range.start,
            range.end.saturating_sub(1),
            dev.address,
            dev.name(),
            dev.calibration.max_amps,
            dev.calibration.shunt_micro_ohms
        );
    }
    println!("total slots: {}", registry.slot_count());
    Ok(())
}

async fn run(
    setup_path: &str,
    store_path: Option<&str>,
    duration_secs: Option<u64>,
    show_metrics: bool,
) -> Result<()> {
    let setup = pm::load_setup_file(setup_path)?;
    let hub = pm::MetricsHub::new().map_err(|e| anyhow::anyhow!(e))?;
    let registry = Arc::new(build_registry(&setup));
    hub.observe_discovery(registry.device_count(), registry.slot_count());

    let mut store: Box<dyn ConfigStore> = match store_path {
        Some(p) => Box::new(pm::JsonFileConfigStore::new(p)),
        None => Box::new(pm::MemoryConfigStore::new()),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = pm::TokioScheduler::new();
    let mut samplers = Vec::with_capacity(setup.samplers.len());
    for spec in &setup.samplers {
        let mut sampler = ValueSampler::with_config_path(
            registry.clone(),
            spec.slot,
            spec.kind,
            Duration::from_millis(spec.read_delay_ms),
            spec.config_path.clone(),
            &*store,
        )
        .with_metrics(hub.dev.clone());
        sampler.connect_to(Arc::new(pm::ChannelSink::new(
            spec.path.clone(),
            spec.slot,
            spec.kind,
            tx.clone(),
        )));
        sampler.enable(&mut scheduler);
        samplers.push(sampler);
    }
    drop(tx);
    info!(
        "{} of {} samplers running",
        scheduler.task_count(),
        samplers.len()
    );

    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(reading) = rx.recv() => {
                println!("{}", serde_json::to_string(&reading)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
        }
    }
    scheduler.shutdown();

    for sampler in &samplers {
        if let Err(e) = sampler.save_configuration(&mut *store) {
            warn!(path = sampler.config_path(), error = %e, "failed to save sampler config");
        }
    }
    if show_metrics {
        print!("{}", hub.encode_text());
    }
    info!("power monitor shutting down");
    Ok(())
}
