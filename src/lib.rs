use std::env;

use futures::StreamExt;
use log::info;

use crate::config::io::ConfigIO;
use crate::device::backend::BleRadio;
use crate::device::coordinator::Coordinator;
use crate::device::types::{AcquisitionEvent, DeviceCategory, SensorReading};
use crate::error::AppRunError;

pub mod config;
pub mod device;
pub mod error;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .level_for("btleplug", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub struct RunOptions {
    pub categories: Vec<DeviceCategory>,
}

/// Headless acquisition loop: starts the requested categories, prints status
/// and reading events to stdout, stops everything on Ctrl-C. Stands in for
/// the excluded dashboard/session-recorder layer.
pub async fn run(options: RunOptions) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut locker = config_io.locker()?;
    let _config_guard = locker.lock()?;
    let config = config_io.read().await?;
    // materialize defaults so the file can be hand-edited
    config_io.save(config.clone()).await?;

    let radio = BleRadio::new().await?;
    let mut coordinator = Coordinator::new(radio.clone(), radio, &config);
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();
    let coordinator_task = tokio::spawn(coordinator.run());

    for category in &options.categories {
        handle.start_acquisition(*category).await?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received; stopping acquisition");
                let _ = handle.stop_all().await;
                break;
            }
            event = events.next() => match event {
                Some(AcquisitionEvent::Status(status)) => {
                    let state = if status.connected { "connected" } else { "disconnected" };
                    println!("[{}] {} ({}) {}", status.category, status.name, status.address, state);
                }
                Some(AcquisitionEvent::Reading { reading, .. }) => match reading {
                    SensorReading::HeartRate { bpm } => {
                        println!("heart rate: {} bpm", bpm);
                    }
                    SensorReading::PowerCadence { power_watts, cadence_rpm } => {
                        println!("power: {} W | cadence: {} rpm", power_watts, cadence_rpm);
                    }
                },
                // log lines already reach stderr through the logger
                Some(AcquisitionEvent::Log(_)) => {}
                None => break,
            }
        }
    }

    let _ = coordinator_task.await;
    Ok(())
}
