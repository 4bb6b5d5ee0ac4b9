//! Show live temperature readings from a remote service.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::sync::Arc;
use temperature_monitor::config::Environment;
use temperature_monitor::display::create_store;
use temperature_monitor::scheduler::Scheduler;
use temperature_monitor::services::remote::HttpSource;
use temperature_monitor::{logging, view};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    color_backtrace::install();

    let env = Environment::load()?;
    let config = env.config()?;
    logging::init(&config.logging)?;

    info!(
        "Starting temperature monitor, version = {}, remote = {}",
        env!("CARGO_PKG_VERSION"),
        config.remote.base_url
    );

    let source = HttpSource::new(&config.remote)?;
    let labels = config.display.labels()?;

    let (tx, rx) = create_store("display");
    let _view = view::run(
        rx,
        view::LogView::new(&config.display),
        config.display.refresh,
    );
    let scheduler = Scheduler::start(Arc::new(source), labels, &config.polling, tx)?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");

    scheduler.stop();

    Ok(())
}
