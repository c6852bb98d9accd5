//! ==============================================================================
//! main.rs - sampling daemon entry point
//! ==============================================================================
//!
//! purpose:
//!     this is the writer process of the weather station. it owns the
//!     sense hat (sensors, led matrix, joystick) and is the ONLY process
//!     that ever writes the shared json store.
//!
//! responsibilities:
//!     - load configuration (config/station.toml, defaults otherwise)
//!     - initialize the hal (simulated, or python sense_hat bridge with
//!       --features hardware)
//!     - run the sampling loop: read sensors, smooth, flush to the store,
//!       drive the led matrix
//!     - forward joystick presses into the loop as messages
//!
//! relationships:
//!     - uses: sampler.rs (the loop), store.rs (writer), hal.rs (hardware)
//!     - the consumer side lives in bin/web.rs and only ever reads the
//!       store file this process writes
//!
//! ==============================================================================

use anyhow::Result;
use sensehat_station::config::StationConfig;
use sensehat_station::hal::{Hal, SenseHat};
use sensehat_station::sampler;
use sensehat_station::store::JsonFileStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let config = StationConfig::load_or_default();

    // step 2: logging, level from config unless RUST_LOG overrides
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    tracing::info!("Sense HAT weather station starting");

    // step 3: hardware + joystick message channel
    let hal = Hal::new();
    let (button_tx, button_rx) = tokio::sync::mpsc::unbounded_channel();
    hal.watch_joystick(button_tx)?;

    // step 4: the shared store this process is the sole writer of
    let store = JsonFileStore::new(config.store.path.clone());

    // step 5: the sampling loop; only a sensor or store failure ends it
    sampler::run(&hal, &store, &config, button_rx).await
}
