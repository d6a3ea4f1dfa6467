//! camstream: simulated camera acquisition into a storage backend

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camstream::{Acquisition, Camera, Config, SimulatedCamera};
use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("camstream=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("camstream launching...");

    // Load configuration
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref())?;
    camstream::CONFIG.store(Arc::new(config.clone()));

    let camera = Arc::new(SimulatedCamera::new(config.camera.kind));
    camera.configure(&config.camera.properties)?;
    info!(shape = ?camera.shape(), kind = ?config.camera.kind, "Camera armed");

    let mut storage = config.storage.kind.create();
    storage.configure(&config.storage.properties)?;
    info!(backend = storage.name(), "Storage armed");

    let acquisition = Acquisition::new(camera, storage, config.acquisition.clone());
    let abort = acquisition.abort_handle();
    let stats = acquisition.stats();
    let mut task = tokio::task::spawn_blocking(move || acquisition.run());

    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let outcome = loop {
        tokio::select! {
            joined = &mut task => break joined?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; stopping acquisition");
                abort.abort();
            }
            _ = progress.tick() => {
                let s = stats.snapshot();
                info!(pulled = s.frames_pulled, written = s.frames_written, bytes = s.bytes_written, "Progress");
            }
        }
    };

    let (snapshot, mut storage) = outcome?;
    storage.destroy();
    info!(?snapshot, "camstream shutting down");
    Ok(())
}
