use anyhow::Context;
use clap::Parser;
use jiff::Timestamp;
use tickstore::{
    console::Console,
    logging,
    producer::{HostProbe, SimulatedDevice},
    recorder::Recorder,
    scheduler::Scheduler,
    settings::Settings,
    store::Store,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    logging::init(&settings.log_file, &settings.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "session started");

    let store = match Store::open(&settings.db_path) {
        Ok(store) => store,
        Err(err) => {
            error!(%err, "cannot open store");
            return Err(err.into());
        }
    };
    info!(path = %settings.db_path.display(), "store ready");

    let recorder = Recorder::new(store.clone());
    if let Err(err) = recorder.stamp_config(Timestamp::now()) {
        warn!(%err, "failed to write config");
    }

    let device = match settings.seed {
        Some(seed) => SimulatedDevice::seeded(seed),
        None => SimulatedDevice::new(),
    };
    let scheduler = Scheduler::new(recorder, HostProbe::new(), device, settings.interval);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampling = tokio::spawn(scheduler.run(shutdown_rx));

    let console_store = store.clone();
    let console = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        Console::new(console_store, stdin.lock(), stdout.lock()).run()
    });
    let outcome = console.await.context("console task")?;

    let _ = shutdown_tx.send(true);
    let recorded = sampling.await.context("sampling task")?;
    store.flush().context("flushing store")?;
    info!(recorded, "session ended");
    outcome
}
