use std::fs::File;
use std::io::Read as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use log::{error, info};

use crate::config::SensorConfig;
use crate::device::LoggingEventHandler;
use crate::sensor::{GpioSensor, PresenceSensor, SimulatedSensor};
use crate::store::FileStore;

mod config;
mod device;
mod messages;
mod mqtt;
mod presence;
mod sensor;
mod store;

#[derive(Parser, Debug)]
#[command(version, about = "Bridges a radar presence sensor to an occupancy endpoint")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        pretty_env_logger::init();
    }

    let args = Args::parse();
    info!("Starting occupancy sensor bridge");

    // Only returns if startup failed.
    if let Err(err) = run(args).await {
        error!("Startup failed: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut file = File::open(&args.config)
        .with_context(|| format!("opening {}", args.config.display()))?;
    let mut config_contents = String::new();
    file.read_to_string(&mut config_contents)?;

    let config: config::AppConfig =
        toml::de::from_str(&config_contents).context("parsing configuration")?;

    let store = FileStore::new(
        config
            .store
            .and_then(|s| s.path)
            .unwrap_or(PathBuf::from("occupancy-store")),
    );

    let device = config.device.unwrap_or_default();
    let room_name = device.room_name.unwrap_or("Living Room".to_string());
    let period = Duration::from_millis(device.poll_interval_ms.unwrap_or(500));

    match config.sensor.unwrap_or_default() {
        SensorConfig::Simulated { toggle_seconds } => {
            let sensor = SimulatedSensor::new(Duration::from_secs(toggle_seconds.unwrap_or(5)));
            serve(store, sensor, &config.mqtt, &room_name, period).await
        }
        SensorConfig::Gpio { path, active_low } => {
            let sensor = GpioSensor::new(path, active_low.unwrap_or(false));
            serve(store, sensor, &config.mqtt, &room_name, period).await
        }
    }
}

async fn serve<S: PresenceSensor>(
    mut store: FileStore,
    sensor: S,
    mqtt_config: &config::MqttConfig,
    room_name: &str,
    period: Duration,
) -> anyhow::Result<()> {
    let stack = mqtt::MqttStack::new(mqtt_config);
    let mut sync = presence::start_device(
        &mut store,
        sensor,
        stack,
        room_name,
        Box::new(LoggingEventHandler),
    )?;

    info!(
        "Polling presence every {}ms on endpoint {}",
        period.as_millis(),
        sync.endpoint()
    );
    sync.run_loop(period).await;

    Ok(())
}
