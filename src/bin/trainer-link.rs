use clap::Parser;
use log::{error, info};

use trainer_link::device::types::DeviceCategory;
use trainer_link::{init_logging, run, RunOptions};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Acquire only a heart rate sensor
    #[arg(long, conflicts_with = "power_only")]
    heart_rate_only: bool,

    /// Acquire only a power source (smart trainer)
    #[arg(long)]
    power_only: bool,
}

impl Args {
    fn categories(&self) -> Vec<DeviceCategory> {
        if self.heart_rate_only {
            vec![DeviceCategory::HeartRate]
        } else if self.power_only {
            vec![DeviceCategory::PowerSource]
        } else {
            DeviceCategory::ALL.to_vec()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();
    info!("trainer-link {}", env!("CARGO_PKG_VERSION"));

    let options = RunOptions { categories: args.categories() };

    if let Err(err) = run(options).await {
        error!("{}", err);
        std::process::exit(1);
    }
}
