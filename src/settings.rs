use std::{path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "tickstore", version, about = "Samples host and device metrics into a local store")]
pub struct Settings {
    /// Database directory.
    #[arg(long, env = "TICKSTORE_DB", default_value = "ubiDB.db")]
    pub db_path: PathBuf,
    /// Append-only diagnostics file.
    #[arg(long, env = "TICKSTORE_LOG", default_value = "log.txt")]
    pub log_file: PathBuf,
    /// Time between ticks, e.g. `1s` or `500ms`.
    #[arg(long, env = "TICKSTORE_INTERVAL", default_value = "1s", value_parser = humantime::parse_duration)]
    pub interval: Duration,
    /// Used when `RUST_LOG` is not set.
    #[arg(long, env = "TICKSTORE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    /// Seed for the simulated device.
    #[arg(long, env = "TICKSTORE_SEED")]
    pub seed: Option<u64>,
}
